use tokio::net::TcpStream;

use crate::error::Error;

pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, Error> {
    let stream = TcpStream::connect((host, port)).await?;

    // we want each protocol message on the wire as soon as it is flushed
    stream.set_nodelay(true)?;

    Ok(stream)
}
