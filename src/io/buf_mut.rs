pub(crate) trait BufMutExt {
    /// Write a string followed by the protocol's NUL terminator.
    fn put_str_nul(&mut self, s: &str);

    /// Write a message body with its big-endian `Int32` length (which counts
    /// itself) patched in front, as nearly every frontend message wants.
    fn put_length_prefixed<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<u8>);
}

impl BufMutExt for Vec<u8> {
    fn put_str_nul(&mut self, s: &str) {
        self.extend_from_slice(s.as_bytes());
        self.push(0);
    }

    fn put_length_prefixed<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<u8>),
    {
        // reserve space for the length, write the body, patch the length in
        let offset = self.len();
        self.extend_from_slice(&[0; 4]);

        f(self);

        let size = (self.len() - offset) as i32;
        self[offset..(offset + 4)].copy_from_slice(&size.to_be_bytes());
    }
}

#[test]
fn test_put_length_prefixed() {
    let mut buf = Vec::new();

    buf.put_length_prefixed(|buf| {
        buf.extend_from_slice(b"Hello World!");
    });

    assert_eq!(buf, b"\x00\x00\x00\x10Hello World!");
}

#[test]
fn test_put_str_nul() {
    let mut buf = Vec::new();

    buf.put_str_nul("client_encoding");

    assert_eq!(buf, b"client_encoding\x00");
}
