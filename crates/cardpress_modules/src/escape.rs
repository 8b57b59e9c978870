//! Decoding of JS string literal bodies (strict mode rules).

/// Decode the text between the quotes of a string literal.
///
/// Octal escapes are rejected as in strict mode. Lone surrogates decode to
/// U+FFFD since Rust strings cannot carry them.
pub fn unescape_js(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut pending_high: Option<u32> = None;

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            flush_surrogate(&mut out, &mut pending_high);
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err("unterminated escape sequence".to_string());
        };
        let unit = match esc {
            'n' => Some('\n' as u32),
            'r' => Some('\r' as u32),
            't' => Some('\t' as u32),
            'b' => Some(0x08),
            'f' => Some(0x0C),
            'v' => Some(0x0B),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => Some(0),
            '1'..='9' | '0' => {
                return Err(format!("octal escape '\\{}' not allowed", esc));
            }
            'x' => Some(read_hex(&mut chars, 2)?),
            'u' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                            _ => return Err("malformed \\u{...} escape".to_string()),
                        }
                    }
                    let code = u32::from_str_radix(&digits, 16)
                        .map_err(|_| "malformed \\u{...} escape".to_string())?;
                    if code > 0x10FFFF {
                        return Err("code point out of range".to_string());
                    }
                    Some(code)
                } else {
                    Some(read_hex(&mut chars, 4)?)
                }
            }
            // Line continuations produce nothing.
            '\n' | '\u{2028}' | '\u{2029}' => None,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                None
            }
            other => Some(other as u32),
        };

        let Some(unit) = unit else {
            continue;
        };
        push_unit(&mut out, &mut pending_high, unit);
    }
    flush_surrogate(&mut out, &mut pending_high);
    Ok(out)
}

fn read_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, len: usize) -> Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..len {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| "malformed hexadecimal escape".to_string())?;
        value = value * 16 + digit;
    }
    Ok(value)
}

fn push_unit(out: &mut String, pending_high: &mut Option<u32>, unit: u32) {
    match unit {
        0xD800..=0xDBFF => {
            flush_surrogate(out, pending_high);
            *pending_high = Some(unit);
        }
        0xDC00..=0xDFFF => match pending_high.take() {
            Some(high) => {
                let code = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            None => out.push('\u{FFFD}'),
        },
        _ => {
            flush_surrogate(out, pending_high);
            out.push(char::from_u32(unit).unwrap_or('\u{FFFD}'));
        }
    }
}

fn flush_surrogate(out: &mut String, pending_high: &mut Option<u32>) {
    if pending_high.take().is_some() {
        out.push('\u{FFFD}');
    }
}
