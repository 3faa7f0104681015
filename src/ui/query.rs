use crate::host_bridge::bridge_errors::BridgeError;

/// Value of `variable` in a `?a=b&c=d` query string.
///
/// Only the text between the first and second `=` counts as the value, and a key without any
/// `=` is treated as absent. Values are returned still encoded.
pub fn get_query_variable<'a>(query: &'a str, variable: &str) -> Option<&'a str> {
    let query = query.strip_prefix('?').unwrap_or(query);

    query.split('&').find_map(|pair| {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next()) {
            (Some(key), Some(value)) if key == variable => Some(value),
            _ => None,
        }
    })
}

/// Percent-decode a URI component. `+` is left alone.
pub fn decode_uri_component(component: &str) -> Result<String, BridgeError> {
    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] != b'%' {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }

        let escape = bytes
            .get(index + 1..index + 3)
            .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());

        let Some(byte) = escape else {
            return Err(malformed(component));
        };
        decoded.push(byte);
        index += 3;
    }

    String::from_utf8(decoded).map_err(|_| malformed(component))
}

fn malformed(component: &str) -> BridgeError {
    BridgeError::config_error(format!("Malformed URI component '{component}'"))
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
