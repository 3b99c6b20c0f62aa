//! Turns the model's free-text reply into [`InvoiceFields`].
//!
//! Two passes:
//! 1. [`clean_model_output`] strips markdown noise from the whole reply.
//! 2. [`parse_invoice_response`] reads `Key: value` lines and matches each key
//!    against the canonical field names, exact first and then by containment.
//!
//! Neither pass fails. Lines that cannot be read are skipped, and fields
//! nothing matched are reported as [`NOT_AVAILABLE`].

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace};

use crate::model::{InvoiceField, InvoiceFields, NOT_AVAILABLE};

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[^`]*```").expect("valid code block pattern"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#+\s").expect("valid heading pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid blank line pattern"));

/// Remove `<think>...</think>` blocks emitted by reasoning models.
///
/// An unclosed `<think>` swallows everything after it.
pub fn strip_think_tags(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end) = result[start..].find("</think>") {
            result = format!("{}{}", &result[..start], &result[start + end + 8..]);
        } else {
            result.truncate(start);
            break;
        }
    }
    result
}

/// Strip markdown decoration from the accumulated model reply.
///
/// Removes fenced code blocks, every `**`, heading markers and blank lines.
///
/// ```
/// use invoice_ocr::parser::clean_model_output;
///
/// let raw = "## Result\n\n**Currency:** USD\n\n```\nnoise\n```";
/// assert_eq!(clean_model_output(raw), "Result\nCurrency: USD");
/// ```
pub fn clean_model_output(text: &str) -> String {
    let text = strip_think_tags(text);
    let text = CODE_BLOCK.replace_all(&text, "");
    let text = text.replace("**", "");
    let text = HEADING.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Match a lower-cased key against the canonical fields.
///
/// Three tiers, each taking the first hit in canonical order:
/// 1. the key equals a field name;
/// 2. the key contains a field name or is contained in one. A long key that
///    happens to contain a field name ("amount due in currency") maps to the
///    first such field;
/// 3. the key abbreviates a field name word by word ("invoice no",
///    "legal ent name").
pub fn match_field(candidate: &str) -> Option<InvoiceField> {
    if candidate.is_empty() {
        return None;
    }

    if let Some(field) = InvoiceField::ALL
        .into_iter()
        .find(|field| field.as_str().to_lowercase() == candidate)
    {
        return Some(field);
    }

    if let Some(field) = InvoiceField::ALL.into_iter().find(|field| {
        let name = field.as_str().to_lowercase();
        candidate.contains(&name) || name.contains(candidate)
    }) {
        return Some(field);
    }

    InvoiceField::ALL
        .into_iter()
        .find(|field| abbreviates(candidate, &field.as_str().to_lowercase()))
}

// Common invoice shorthands for a whole word of a field name.
const WORD_ABBREVIATIONS: &[(&str, &str)] = &[
    ("no", "number"),
    ("nr", "number"),
    ("#", "number"),
    ("acct", "account"),
    ("amt", "amount"),
    ("pmt", "payment"),
];

// Every word of `key` abbreviates the word at the same position in `name`.
fn abbreviates(key: &str, name: &str) -> bool {
    let key_words: Vec<&str> = key.split_whitespace().collect();
    let name_words: Vec<&str> = name.split_whitespace().collect();
    !key_words.is_empty()
        && key_words.len() <= name_words.len()
        && key_words
            .iter()
            .zip(&name_words)
            .all(|(k, n)| abbreviates_word(k, n))
}

fn abbreviates_word(key_word: &str, name_word: &str) -> bool {
    let key_word = key_word.trim_end_matches('.');
    if key_word.is_empty() {
        return false;
    }
    name_word.starts_with(key_word)
        || WORD_ABBREVIATIONS
            .iter()
            .any(|&(short, full)| short == key_word && full == name_word)
}

/// Clean a single field value.
///
/// Strips a leading `[` and a trailing `]`, then a leading and a trailing
/// `**`, and trims the result.
pub fn clean_value(raw: &str) -> String {
    let value = raw.trim();
    let value = value.strip_prefix('[').unwrap_or(value);
    let value = value.strip_suffix(']').unwrap_or(value);
    let value = value.strip_prefix("**").unwrap_or(value);
    let value = value.strip_suffix("**").unwrap_or(value);
    value.trim().to_string()
}

/// Parse `Key: value` lines into a total field mapping.
///
/// ```
/// use invoice_ocr::{parse_invoice_response, InvoiceField, NOT_AVAILABLE};
///
/// let fields = parse_invoice_response("Invoice no: INV-7\nCurrency: [EUR]\nnothing here");
/// assert_eq!(fields.get(InvoiceField::InvoiceNumber), "INV-7");
/// assert_eq!(fields.get(InvoiceField::Currency), "EUR");
/// assert_eq!(fields.get(InvoiceField::VendorName), NOT_AVAILABLE);
/// ```
pub fn parse_invoice_response(response: &str) -> InvoiceFields {
    let mut slots: [Option<String>; InvoiceField::COUNT] = Default::default();

    for line in response.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once(':') else {
            trace!(line, "Skipping line without a colon");
            continue;
        };

        let candidate = key.trim().to_lowercase();
        let Some(field) = match_field(&candidate) else {
            trace!(key = %candidate, "No field matches key");
            continue;
        };

        let cleaned = clean_value(value);
        debug!(field = %field, value = %cleaned, "Matched field");
        slots[field.index()] = Some(if cleaned.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            cleaned
        });
    }

    let fields = InvoiceFields::from_slots(slots);
    debug!(
        available = fields.available_count(),
        total = InvoiceField::COUNT,
        "Parsed invoice response"
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_all_sentinels() {
        let fields = parse_invoice_response("");
        assert_eq!(fields.iter().count(), InvoiceField::COUNT);
        assert!(fields.iter().all(|(_, value)| value == NOT_AVAILABLE));
    }

    #[test]
    fn test_exact_match_preserves_ids_verbatim() {
        let fields = parse_invoice_response("Currency: USD\nVAT ID: DE123456789");
        assert_eq!(fields.get(InvoiceField::Currency), "USD");
        assert_eq!(fields.get(InvoiceField::VatId), "DE123456789");
    }

    #[test]
    fn test_fuzzy_key_maps_by_containment() {
        let fields = parse_invoice_response("invoice no: 42\n1. Vendor Address: Main St 1");
        assert_eq!(fields.get(InvoiceField::InvoiceNumber), "42");
        assert_eq!(fields.get(InvoiceField::VendorAddress), "Main St 1");
    }

    #[test]
    fn test_value_cleanup() {
        assert_eq!(clean_value("[1234.56]"), "1234.56");
        assert_eq!(clean_value("**1234.56**"), "1234.56");
        assert_eq!(clean_value("  [ 12 ] "), "12");
        assert_eq!(clean_value("[]"), "");
    }

    #[test]
    fn test_last_write_wins() {
        let fields = parse_invoice_response("Currency: USD\nCurrency: EUR");
        assert_eq!(fields.get(InvoiceField::Currency), "EUR");
    }

    #[test]
    fn test_empty_value_becomes_sentinel_and_overwrites() {
        let fields = parse_invoice_response("Currency: USD\nCurrency: []");
        assert_eq!(fields.get(InvoiceField::Currency), NOT_AVAILABLE);
    }

    #[test]
    fn test_lines_without_colon_are_ignored() {
        let fields = parse_invoice_response("Here are the details\nCurrency USD\nPayment Terms: Net 30");
        assert_eq!(fields.get(InvoiceField::Currency), NOT_AVAILABLE);
        assert_eq!(fields.get(InvoiceField::PaymentTerms), "Net 30");
        assert_eq!(fields.available_count(), 1);
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let fields = parse_invoice_response("Payment Terms: Due: 30 days");
        assert_eq!(fields.get(InvoiceField::PaymentTerms), "Due: 30 days");
    }

    #[test]
    fn test_match_field_tie_break_uses_canonical_order() {
        assert_eq!(match_field("name"), Some(InvoiceField::LegalEntityName));
        assert_eq!(match_field("address"), Some(InvoiceField::LegalEntityAddress));
        assert_eq!(match_field("vendor name"), Some(InvoiceField::VendorName));
        assert_eq!(match_field("gl account number"), Some(InvoiceField::GlAccountNumber));
        assert_eq!(match_field(""), None);
        assert_eq!(match_field("subtotal"), None);
    }

    #[test]
    fn test_abbreviated_key_matches_word_by_word() {
        assert_eq!(match_field("invoice no"), Some(InvoiceField::InvoiceNumber));
        assert_eq!(match_field("legal ent name"), Some(InvoiceField::LegalEntityName));
        assert_eq!(match_field("bank acc no"), Some(InvoiceField::BankAccountNumber));
        assert_eq!(match_field("invoice #"), Some(InvoiceField::InvoiceNumber));
        assert_eq!(match_field("invoice no extra words here"), None);
        assert_eq!(match_field("inv total"), None);

        let fields = parse_invoice_response("Invoice No.: 42");
        assert_eq!(fields.get(InvoiceField::InvoiceNumber), "42");
    }

    #[test]
    fn test_long_key_containing_field_name_matches() {
        assert_eq!(
            match_field("total in currency"),
            Some(InvoiceField::Currency)
        );
    }

    #[test]
    fn test_clean_model_output_strips_markup() {
        let raw = "# Invoice\n\n```json\n{\"a\": 1}\n```\n**Invoice number:** 17\n\n\n### Notes\nVAT ID: X1";
        assert_eq!(
            clean_model_output(raw),
            "Invoice\nInvoice number: 17\nNotes\nVAT ID: X1"
        );
    }

    #[test]
    fn test_strip_think_tags() {
        assert_eq!(strip_think_tags("<think>hmm</think>Currency: USD"), "Currency: USD");
        assert_eq!(strip_think_tags("Currency: USD<think>unfinished"), "Currency: USD");
        assert_eq!(strip_think_tags("plain"), "plain");
    }

    #[test]
    fn test_full_reply_round_trip() {
        let reply = "Here is the extracted data:\n\n\
                     **Invoice number:** [INV-2024-001]\n\
                     **Invoice Date:** 05/03/2024\n\
                     **Invoice Amount:** 1,234.56\n\
                     **Currency:** EUR\n\
                     **Vendor Name:** Muster GmbH\n\
                     **Bank Account Number:** DE89 3704 0044 0532 0130 00\n\
                     **GL Account Number:** not available";
        let fields = parse_invoice_response(&clean_model_output(reply));

        assert_eq!(fields.get(InvoiceField::InvoiceNumber), "INV-2024-001");
        assert_eq!(fields.get(InvoiceField::InvoiceDate), "05/03/2024");
        assert_eq!(fields.get(InvoiceField::InvoiceAmount), "1,234.56");
        assert_eq!(fields.get(InvoiceField::Currency), "EUR");
        assert_eq!(fields.get(InvoiceField::VendorName), "Muster GmbH");
        assert_eq!(
            fields.get(InvoiceField::BankAccountNumber),
            "DE89 3704 0044 0532 0130 00"
        );
        assert_eq!(fields.get(InvoiceField::GlAccountNumber), NOT_AVAILABLE);
        assert_eq!(fields.get(InvoiceField::PaymentMethod), NOT_AVAILABLE);
    }
}
