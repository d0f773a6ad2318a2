//! Parsing of run parameters, signers and command lines.

use crate::error::ShellError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use neodbg_core::{Signer, UInt160, UInt256, WitnessScope};
use neodbg_vm::StackItem;
use num_bigint::BigInt;

/// Splits a command line the way a POSIX shell would: whitespace
/// separates, single and double quotes group, backslash escapes inside
/// double quotes and bare words.
pub fn split_command_line(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_word = false;
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    current.push(quoted);
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        Some(quoted) => current.push(quoted),
                        None => {
                            return Err(ShellError::bad_argument("unterminated quote"));
                        }
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parses one signer of the form `<account>[:<scope>[,<scope>…]]`.
///
/// The account is a little-endian 160-bit hash (optional `0x`) or an
/// address; the scope defaults to CalledByEntry.
pub fn parse_signer(argument: &str, address_version: u8) -> Result<Signer, ShellError> {
    let (account_text, scope_text) = match argument.split_once(':') {
        Some((account, scope)) => (account, Some(scope)),
        None => (argument, None),
    };
    let account = parse_account(account_text, address_version)?;
    let scopes = match scope_text {
        Some(text) => WitnessScope::from_list(text)
            .map_err(|e| ShellError::bad_argument(format!("bad witness scope: {e}")))?,
        None => WitnessScope::CalledByEntry,
    };
    Ok(Signer::with_scope(account, scopes))
}

fn parse_account(text: &str, address_version: u8) -> Result<UInt160, ShellError> {
    let bare = text.strip_prefix("0x").unwrap_or(text);
    if bare.len() == 40 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return UInt160::from_le_hex(bare)
            .map_err(|e| ShellError::bad_argument(format!("bad account hash: {e}")));
    }
    UInt160::from_address(text, address_version)
        .map_err(|e| ShellError::bad_argument(format!("bad account: {e}")))
}

/// Parses the signer list that follows `--` on a load command.
pub fn parse_signers(
    arguments: &[String],
    address_version: u8,
) -> Result<Vec<Signer>, ShellError> {
    arguments
        .iter()
        .map(|argument| parse_signer(argument, address_version))
        .collect()
}

/// Parses `run` parameters into stack items.
///
/// Forms: `bool:true`, `int:42`, `string:text`, `bytes:0102`,
/// `hash160:<hex|address>`, `hash256:<hex>`, `[` … `]` for arrays, and
/// bare values that auto-classify as bool, integer or string.
pub fn parse_run_parameters(
    arguments: &[String],
    address_version: u8,
) -> Result<Vec<StackItem>, ShellError> {
    let mut position = 0;
    let mut items = Vec::new();
    while position < arguments.len() {
        let (item, next) = parse_one_parameter(arguments, position, address_version)?;
        items.push(item);
        position = next;
    }
    Ok(items)
}

fn parse_one_parameter(
    arguments: &[String],
    position: usize,
    address_version: u8,
) -> Result<(StackItem, usize), ShellError> {
    let argument = &arguments[position];
    if argument == "[" {
        let mut elements = Vec::new();
        let mut cursor = position + 1;
        loop {
            match arguments.get(cursor) {
                Some(token) if token == "]" => return Ok((StackItem::new_array(elements), cursor + 1)),
                Some(_) => {
                    let (element, next) = parse_one_parameter(arguments, cursor, address_version)?;
                    elements.push(element);
                    cursor = next;
                }
                None => return Err(ShellError::bad_argument("unterminated array parameter")),
            }
        }
    }
    Ok((parse_scalar_parameter(argument, address_version)?, position + 1))
}

fn parse_scalar_parameter(
    argument: &str,
    address_version: u8,
) -> Result<StackItem, ShellError> {
    if let Some((prefix, value)) = argument.split_once(':') {
        return match prefix {
            "bool" => match value {
                "true" => Ok(StackItem::from_bool(true)),
                "false" => Ok(StackItem::from_bool(false)),
                other => Err(ShellError::bad_argument(format!("bad boolean: {other}"))),
            },
            "int" => value
                .parse::<BigInt>()
                .map(StackItem::Integer)
                .map_err(|e| ShellError::bad_argument(format!("bad integer: {e}"))),
            "string" => Ok(StackItem::from_bytes(value.as_bytes().to_vec())),
            "bytes" => hex::decode(value.strip_prefix("0x").unwrap_or(value))
                .map(StackItem::from_bytes)
                .map_err(|e| ShellError::bad_argument(format!("bad hex: {e}"))),
            "hash160" => {
                let hash = parse_account(value, address_version)
                    .or_else(|_| {
                        UInt160::from_hex(value)
                            .map_err(|e| ShellError::bad_argument(format!("bad hash160: {e}")))
                    })?;
                Ok(StackItem::from_bytes(hash.to_le_vec()))
            }
            "hash256" => UInt256::from_hex(value)
                .map(|hash| StackItem::from_bytes(hash.to_le_vec()))
                .map_err(|e| ShellError::bad_argument(format!("bad hash256: {e}"))),
            other => Err(ShellError::bad_argument(format!(
                "unknown parameter type: {other}"
            ))),
        };
    }
    // Bare values classify as bool, integer, or string.
    match argument {
        "true" => return Ok(StackItem::from_bool(true)),
        "false" => return Ok(StackItem::from_bool(false)),
        _ => {}
    }
    if let Ok(value) = argument.parse::<BigInt>() {
        return Ok(StackItem::Integer(value));
    }
    Ok(StackItem::from_bytes(argument.as_bytes().to_vec()))
}

/// Splits loader arguments at `--`: everything after it is signers.
pub fn split_signer_tail(arguments: &[String]) -> (&[String], &[String]) {
    match arguments.iter().position(|a| a == "--") {
        Some(position) => (&arguments[..position], &arguments[position + 1..]),
        None => (arguments, &[]),
    }
}

/// Extracts a `--flag <value>` pair from an argument list, returning the
/// remaining arguments and the parsed value.
pub fn take_flag_value(
    arguments: &mut Vec<String>,
    flag: &str,
) -> Result<Option<String>, ShellError> {
    match arguments.iter().position(|a| a == flag) {
        Some(position) => {
            if position + 1 >= arguments.len() {
                return Err(ShellError::bad_argument(format!("{flag} needs a value")));
            }
            let value = arguments.remove(position + 1);
            arguments.remove(position);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Extracts a bare `--flag` from an argument list.
pub fn take_flag(arguments: &mut Vec<String>, flag: &str) -> bool {
    match arguments.iter().position(|a| a == flag) {
        Some(position) => {
            arguments.remove(position);
            true
        }
        None => false,
    }
}

/// The interpretations `parse` prints for an argument.
pub fn parse_interpretations(argument: &str, address_version: u8) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Ok(value) = argument.parse::<BigInt>() {
        let bytes = neodbg_vm::stack_item::integer_to_bytes(&value);
        out.push(("Integer to Hex".into(), hex::encode(&bytes)));
        out.push(("Integer to Base64".into(), BASE64.encode(&bytes)));
    }
    let bare = argument.strip_prefix("0x").unwrap_or(argument);
    if bare.len() == 40 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(hash) = UInt160::from_hex(bare) {
            out.push(("BE ScriptHash to Address".into(), hash.to_address(address_version)));
            out.push(("LE ScriptHash".into(), hex::encode(hash.to_le_vec())));
        }
        if let Ok(hash) = UInt160::from_le_hex(bare) {
            out.push(("LE ScriptHash to Address".into(), hash.to_address(address_version)));
            out.push(("BE ScriptHash".into(), hash.to_string()));
        }
    }
    if let Ok(hash) = UInt160::from_address(argument, address_version) {
        out.push(("Address to BE ScriptHash".into(), hash.to_string()));
        out.push(("Address to LE ScriptHash".into(), hex::encode(hash.to_le_vec())));
        out.push(("Address to Base64 (LE)".into(), BASE64.encode(hash.to_le_vec())));
    }
    if bare.len() % 2 == 0 && !bare.is_empty() {
        if let Ok(bytes) = hex::decode(bare) {
            if let Ok(text) = String::from_utf8(bytes.clone()) {
                if text.chars().all(|c| !c.is_control()) {
                    out.push(("Hex to String".into(), format!("\"{text}\"")));
                }
            }
            out.push((
                "Hex to Integer".into(),
                BigInt::from_signed_bytes_le(&bytes).to_string(),
            ));
            let mut reversed = bytes;
            reversed.reverse();
            out.push(("Swap Endianness".into(), hex::encode(reversed)));
        }
    }
    if let Ok(bytes) = BASE64.decode(argument) {
        if let Ok(text) = String::from_utf8(bytes.clone()) {
            if text.chars().all(|c| !c.is_control()) {
                out.push(("Base64 to String".into(), format!("\"{text}\"")));
            }
        }
        out.push((
            "Base64 to BigInteger".into(),
            BigInt::from_signed_bytes_le(&bytes).to_string(),
        ));
    }
    out.push(("String to Hex".into(), hex::encode(argument.as_bytes())));
    out.push(("String to Base64".into(), BASE64.encode(argument.as_bytes())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_quotes() {
        let words = split_command_line(r#"run method "two words" 'single' plain"#).unwrap();
        assert_eq!(words, vec!["run", "method", "two words", "single", "plain"]);
        assert!(split_command_line(r#"bad "unterminated"#).is_err());
        assert!(split_command_line("").unwrap().is_empty());
    }

    #[test]
    fn signer_defaults_to_called_by_entry() {
        let hash = UInt160::from_script(&[0x42]);
        let text = hex::encode(hash.to_le_vec());
        let signer = parse_signer(&text, 0x35).unwrap();
        assert_eq!(signer.account, hash);
        assert_eq!(signer.scopes, WitnessScope::CalledByEntry);
    }

    #[test]
    fn signer_parses_scopes_and_addresses() {
        let hash = UInt160::from_script(&[0x42]);
        let address = hash.to_address(0x35);
        let signer = parse_signer(&format!("{address}:Global"), 0x35).unwrap();
        assert_eq!(signer.account, hash);
        assert_eq!(signer.scopes, WitnessScope::Global);

        let text = format!("0x{}:None", hex::encode(hash.to_le_vec()));
        let signer = parse_signer(&text, 0x35).unwrap();
        assert_eq!(signer.scopes, WitnessScope::None);

        assert!(parse_signer("nonsense:Global", 0x35).is_err());
        assert!(parse_signer(&format!("{address}:Sideways"), 0x35).is_err());
    }

    #[test]
    fn run_parameters_classify() {
        let arguments: Vec<String> = ["true", "42", "hello", "int:-7", "bytes:0a0b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let items = parse_run_parameters(&arguments, 0x35).unwrap();
        assert!(items[0].as_bool());
        assert_eq!(items[1].try_integer().unwrap(), 42.into());
        assert_eq!(items[2].try_bytes().unwrap(), b"hello");
        assert_eq!(items[3].try_integer().unwrap(), (-7).into());
        assert_eq!(items[4].try_bytes().unwrap(), vec![0x0a, 0x0b]);
    }

    #[test]
    fn run_parameters_nest_arrays() {
        let arguments: Vec<String> = ["[", "1", "[", "string:x", "]", "]"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let items = parse_run_parameters(&arguments, 0x35).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].len().unwrap(), 2);

        let unterminated: Vec<String> = ["[", "1"].iter().map(|s| s.to_string()).collect();
        assert!(parse_run_parameters(&unterminated, 0x35).is_err());
    }

    #[test]
    fn signer_tail_splits_at_dash_dash() {
        let arguments: Vec<String> = ["0011", "--", "abc:Global"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (head, tail) = split_signer_tail(&arguments);
        assert_eq!(head, &["0011".to_string()]);
        assert_eq!(tail, &["abc:Global".to_string()]);
    }

    #[test]
    fn flags_extract() {
        let mut arguments: Vec<String> = ["aa", "--historic", "3", "--diff"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            take_flag_value(&mut arguments, "--historic").unwrap(),
            Some("3".into())
        );
        assert!(take_flag(&mut arguments, "--diff"));
        assert_eq!(arguments, vec!["aa"]);
        assert!(!take_flag(&mut arguments, "--diff"));
    }

    #[test]
    fn parse_round_trips_hash_forms() {
        let hash = UInt160::from_script(&[0x42]);
        let be_hex = hash.to_string();
        let forms = parse_interpretations(&be_hex, 0x35);
        let address = forms
            .iter()
            .find(|(label, _)| label == "BE ScriptHash to Address")
            .map(|(_, value)| value.clone())
            .unwrap();

        // Feeding the address back reproduces both scripthash forms.
        let address_forms = parse_interpretations(&address, 0x35);
        let be_back = address_forms
            .iter()
            .find(|(label, _)| label == "Address to BE ScriptHash")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(be_back, be_hex);
        let le_back = address_forms
            .iter()
            .find(|(label, _)| label == "Address to LE ScriptHash")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(le_back, hex::encode(hash.to_le_vec()));
    }

    #[test]
    fn integer_survives_hex_and_base64() {
        for value in ["5", "-300", "170141183460469231731687303715884105727"] {
            let forms = parse_interpretations(value, 0x35);
            let hex_form = forms
                .iter()
                .find(|(label, _)| label == "Integer to Hex")
                .map(|(_, v)| v.clone())
                .unwrap();
            let back = forms
                .iter()
                .find(|(label, _)| label == "Integer to Base64")
                .map(|(_, v)| v.clone())
                .unwrap();
            // Hex back to integer.
            let bytes = hex::decode(&hex_form).unwrap();
            assert_eq!(BigInt::from_signed_bytes_le(&bytes).to_string(), value);
            // Base64 back to integer.
            let bytes = BASE64.decode(&back).unwrap();
            assert_eq!(BigInt::from_signed_bytes_le(&bytes).to_string(), value);
        }
    }
}
