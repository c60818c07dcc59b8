use sha1::{Digest, Sha1};

const MAX_ID_LEN: usize = 100;

/// Convert a file id to something usable in e-mail addresses, URLs and paths
///
/// ASCII alphanumerics and `_` are kept; every other byte becomes `-` and
/// its two lowercase hex digits, so distinct ids never share an encoding.
/// Encodings longer than 100 bytes are cut at an escape boundary and end in
/// `--` plus a digest of the id.
pub fn sanitize_id(id: &str) -> String {
    let mut name = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            name.push(b as char);
        } else {
            name.push('-');
            name.push_str(&hex::encode([b]));
        }
    }

    if name.len() <= MAX_ID_LEN {
        return name;
    }

    // Limit length
    let digest = &sha1_hex(id.as_bytes())[..16];
    let mut end = MAX_ID_LEN - digest.len() - 2;
    // Never split a `-xx` escape
    while name[..end].rfind('-').is_some_and(|i| end - i < 3) {
        end -= 1;
    }
    format!("{}--{}", &name[..end], digest)
}

/// Lowercase hex SHA-1 of `bytes`
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}
