use std::io::Write;

use serde_json::Value;

use crate::error::CliError;

/// Write one JSON document to stdout.
pub fn render(value: &Value, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value, pretty)
}

fn write_json<W: Write>(writer: &mut W, value: &Value, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_output_is_a_single_line() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &json!({"inserted": 2}), false).expect("write");
        assert_eq!(String::from_utf8(buffer).expect("utf8"), "{\"inserted\":2}\n");
    }

    #[test]
    fn pretty_output_is_indented() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &json!({"inserted": 2}), true).expect("write");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "{\n  \"inserted\": 2\n}\n"
        );
    }
}
