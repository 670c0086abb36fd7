use data_encoding::{BASE64, BASE64URL};
use probe_core::mailer::OutgoingMail;

const BODY_LINE_WIDTH: usize = 76;

/// Renders a single-part `text/plain` message.
pub fn render_plain_text(mail: &OutgoingMail<'_>) -> String {
    let ascii = mail.body.is_ascii();
    let (charset, encoding) = if ascii {
        ("us-ascii", "7bit")
    } else {
        ("utf-8", "base64")
    };
    let mut out = String::new();
    push_header(&mut out, "Content-Type", &format!("text/plain; charset=\"{charset}\""));
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(&mut out, "Content-Transfer-Encoding", encoding);
    push_header(&mut out, "To", &encode_header_value(mail.to));
    push_header(&mut out, "From", &encode_header_value(mail.from));
    push_header(&mut out, "Subject", &encode_header_value(mail.subject));
    out.push_str("\r\n");
    if ascii {
        out.push_str(&normalize_line_endings(mail.body));
    } else {
        let encoded = BASE64.encode(mail.body.as_bytes());
        for chunk in encoded.as_bytes().chunks(BODY_LINE_WIDTH) {
            // base64 output is ascii
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
            out.push_str("\r\n");
        }
    }
    out
}

/// The `raw` field expected by the Gmail send endpoint.
pub fn encode_raw(mail: &OutgoingMail<'_>) -> String {
    BASE64URL.encode(render_plain_text(mail).as_bytes())
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn encode_header_value(value: &str) -> String {
    let value: String = value.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    if value.is_ascii() {
        return value;
    }
    format!("=?utf-8?b?{}?=", BASE64.encode(value.as_bytes()))
}

fn normalize_line_endings(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}
