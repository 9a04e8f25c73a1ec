//! Placeholder substitution for message bodies.
//!
//! The format is deliberately closed: only `{full_name}` and `{email}` are
//! recognized. Any other `{...}` sequence is copied through untouched.

use crate::recipient::Recipient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Placeholder {
    FullName,
    Email,
}

impl Placeholder {
    fn value<'r>(&self, recipient: &'r Recipient) -> &'r str {
        match self {
            Self::FullName => &recipient.full_name,
            Self::Email => &recipient.email,
        }
    }
}

/// Fills the recipient's fields into the body.
///
/// Substitution is done in a single pass, so placeholder-like text coming
/// from recipient data is never expanded again.
pub fn render(body: &str, recipient: &Recipient) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let placeholder = tail
            .find('}')
            .and_then(|close| tail[1..close].parse::<Placeholder>().ok().map(|p| (p, close)));
        match placeholder {
            Some((placeholder, close)) => {
                out.push_str(placeholder.value(recipient));
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    out
}
