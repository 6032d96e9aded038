/// Decodes a `0x`-prefixed or bare hex string into a fixed-size array.
pub fn parse_hex<const SIZE: usize>(input: &str) -> Option<[u8; SIZE]> {
    let digits = input.strip_prefix("0x").unwrap_or(input);

    if digits.len() != SIZE * 2 || !digits.is_ascii() {
        return None;
    }

    let mut bytes = [0; SIZE];

    for (byte, pair) in bytes.iter_mut().zip(digits.as_bytes().chunks_exact(2)) {
        let pair = core::str::from_utf8(pair).ok()?;
        *byte = u8::from_str_radix(pair, 16).ok()?;
    }

    Some(bytes)
}

pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut output = "0x".to_owned();

    for byte in bytes.as_ref() {
        output.push_str(&format!("{byte:02x}"));
    }

    output
}
