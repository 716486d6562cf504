use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::connection::PgStream;
use crate::error::Error;
use crate::options::PgConnectOptions;
use crate::protocol::{
    Authentication, AuthenticationSasl, MessageFormat, SaslInitialResponse, SaslResponse,
};

const MECHANISM: &str = "SCRAM-SHA-256";

// without channel binding
const GS2_HEADER: &str = "n,,";

const NONCE_LENGTH: usize = 24;

// SCRAM-SHA-256 as PostgreSQL speaks it; RFC 5802, RFC 7677.
pub(crate) async fn authenticate(
    stream: &mut PgStream,
    options: &PgConnectOptions,
    data: AuthenticationSasl,
) -> Result<(), Error> {
    if !data.mechanisms.iter().any(|m| m == MECHANISM) {
        return Err(Error::Authentication(
            format!(
                "no supported SASL mechanism offered by the server: {:?}",
                data.mechanisms
            )
            .into_boxed_str(),
        ));
    }

    let password = options.password.as_deref().unwrap_or_default();

    // Usernames are prepared with SASLprep; so are passwords, which is the
    // half PostgreSQL actually consults.
    let password = stringprep::saslprep(password)
        .map_err(|_| Error::Authentication("password failed SASLprep normalization".into()))?;

    let nonce = gen_nonce();

    // client-first-message-bare = [reserved-mext ","] username "," nonce ["," extensions]
    //
    // the server derives the user from the startup message and ignores this
    // field, but it must be present
    let client_first_message_bare = format!("n={},r={}", options.username, nonce);

    let client_first_message = format!("{GS2_HEADER}{client_first_message_bare}");

    stream
        .send(SaslInitialResponse {
            mechanism: MECHANISM,
            response: &client_first_message,
        })
        .await?;

    let cont = match stream.recv_expect(MessageFormat::Authentication).await? {
        Authentication::SaslContinue(body) => body,

        auth => {
            return Err(err_protocol!(
                "expected SASLContinue but received {:?}",
                auth
            ));
        }
    };

    // the server nonce must extend the nonce we sent
    if !cont.nonce.starts_with(&nonce) {
        return Err(err_protocol!(
            "server SCRAM nonce does not extend the client nonce"
        ));
    }

    // SaltedPassword := Hi(Normalize(password), salt, i)
    let salted_password = hi(&password, &cont.salt, cont.iterations);

    // ClientKey := HMAC(SaltedPassword, "Client Key")
    let client_key = hmac(&salted_password, b"Client Key");

    // StoredKey := H(ClientKey)
    let stored_key: [u8; 32] = Sha256::digest(client_key).into();

    // client-final-message-without-proof = channel-binding "," nonce
    let client_final_message_wo_proof = format!(
        "c={},r={}",
        BASE64.encode(GS2_HEADER),
        cont.nonce
    );

    // AuthMessage := client-first-message-bare + "," +
    //                server-first-message + "," +
    //                client-final-message-without-proof
    let auth_message = format!(
        "{client_first_message_bare},{server_first},{client_final_message_wo_proof}",
        server_first = cont.message
    );

    // ClientSignature := HMAC(StoredKey, AuthMessage)
    let client_signature = hmac(&stored_key, auth_message.as_bytes());

    // ClientProof := ClientKey XOR ClientSignature
    let mut client_proof = client_key;
    for (proof, signature) in client_proof.iter_mut().zip(client_signature.iter()) {
        *proof ^= signature;
    }

    let client_final_message = format!(
        "{client_final_message_wo_proof},p={}",
        BASE64.encode(client_proof)
    );

    stream.send(SaslResponse(&client_final_message)).await?;

    let final_data = match stream.recv_expect(MessageFormat::Authentication).await? {
        Authentication::SaslFinal(data) => data,

        auth => {
            return Err(err_protocol!("expected SASLFinal but received {:?}", auth));
        }
    };

    // ServerSignature := HMAC(HMAC(SaltedPassword, "Server Key"), AuthMessage)
    let server_key = hmac(&salted_password, b"Server Key");
    let server_signature = hmac(&server_key, auth_message.as_bytes());

    // the server proves it actually knows the (salted) password by echoing
    // `v=` base64(ServerSignature)
    let verifier = final_data
        .strip_prefix(b"v=")
        .and_then(|v| BASE64.decode(v).ok())
        .ok_or_else(|| err_protocol!("malformed SASLFinal verifier"))?;

    if verifier != server_signature.as_slice() {
        return Err(Error::Authentication(
            "server signature verification failed".into(),
        ));
    }

    Ok(())
}

/// A random printable nonce, excluding ','.
fn gen_nonce() -> String {
    let mut rng = rand::thread_rng();

    (0..NONCE_LENGTH)
        .map(|_| {
            // printable = %x21-2B / %x2D-7E
            loop {
                let c = rng.gen_range(0x21..0x7f_u8);

                if c != b',' {
                    return c as char;
                }
            }
        })
        .collect()
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take a key of any size");

    mac.update(data);

    mac.finalize().into_bytes().into()
}

// Hi(str, salt, i) := PBKDF2-HMAC-SHA-256 with a single output block
fn hi(s: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(s.as_bytes()).expect("HMAC can take a key of any size");

    mac.update(salt);
    mac.update(&1_u32.to_be_bytes());

    let mut u: [u8; 32] = mac.finalize().into_bytes().into();
    let mut hi = u;

    for _ in 1..iterations {
        u = hmac(s.as_bytes(), &u);

        for (hi, u) in hi.iter_mut().zip(u.iter()) {
            *hi ^= u;
        }
    }

    hi
}
