use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Value reported for any field the model did not provide.
pub const NOT_AVAILABLE: &str = "not available";

/// The 13 invoice attributes every extraction reports.
///
/// Variant order is the canonical field order. It is used for the prompt
/// template, for result iteration, and as the tie-break when a fuzzy key
/// matches more than one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvoiceField {
    InvoiceNumber,
    InvoiceDate,
    InvoiceAmount,
    Currency,
    LegalEntityName,
    LegalEntityAddress,
    VendorName,
    VendorAddress,
    PaymentTerms,
    PaymentMethod,
    VatId,
    GlAccountNumber,
    BankAccountNumber,
}

impl InvoiceField {
    /// Number of canonical fields.
    pub const COUNT: usize = 13;

    /// All fields in canonical order.
    pub const ALL: [InvoiceField; Self::COUNT] = [
        InvoiceField::InvoiceNumber,
        InvoiceField::InvoiceDate,
        InvoiceField::InvoiceAmount,
        InvoiceField::Currency,
        InvoiceField::LegalEntityName,
        InvoiceField::LegalEntityAddress,
        InvoiceField::VendorName,
        InvoiceField::VendorAddress,
        InvoiceField::PaymentTerms,
        InvoiceField::PaymentMethod,
        InvoiceField::VatId,
        InvoiceField::GlAccountNumber,
        InvoiceField::BankAccountNumber,
    ];

    /// Display name, exactly as it appears in the prompt template.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceField::InvoiceNumber => "Invoice number",
            InvoiceField::InvoiceDate => "Invoice Date",
            InvoiceField::InvoiceAmount => "Invoice Amount",
            InvoiceField::Currency => "Currency",
            InvoiceField::LegalEntityName => "Legal Entity Name",
            InvoiceField::LegalEntityAddress => "Legal Entity Address",
            InvoiceField::VendorName => "Vendor Name",
            InvoiceField::VendorAddress => "Vendor Address",
            InvoiceField::PaymentTerms => "Payment Terms",
            InvoiceField::PaymentMethod => "Payment Method",
            InvoiceField::VatId => "VAT ID",
            InvoiceField::GlAccountNumber => "GL Account Number",
            InvoiceField::BankAccountNumber => "Bank Account Number",
        }
    }

    /// Position in the canonical order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look a field up by display name, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Option<InvoiceField> {
        let needle = name.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(needle))
    }
}

impl fmt::Display for InvoiceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A total mapping from every [`InvoiceField`] to a non-empty value.
///
/// Missing values hold [`NOT_AVAILABLE`]. There is no way to build an
/// instance with an absent or empty entry.
///
/// # Example
///
/// ```
/// use invoice_ocr::{InvoiceField, InvoiceFields, NOT_AVAILABLE};
///
/// let fields = InvoiceFields::default();
/// assert_eq!(fields.get(InvoiceField::Currency), NOT_AVAILABLE);
/// assert_eq!(fields.iter().count(), InvoiceField::COUNT);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFields {
    values: [String; InvoiceField::COUNT],
}

impl Default for InvoiceFields {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| NOT_AVAILABLE.to_string()),
        }
    }
}

impl InvoiceFields {
    /// Build from per-field slots; empty or missing slots become the sentinel.
    pub fn from_slots(slots: [Option<String>; InvoiceField::COUNT]) -> Self {
        let values = slots.map(|slot| match slot {
            Some(value) if !value.trim().is_empty() => value,
            _ => NOT_AVAILABLE.to_string(),
        });
        Self { values }
    }

    pub fn get(&self, field: InvoiceField) -> &str {
        &self.values[field.index()]
    }

    /// Replace a single value. An empty value collapses to the sentinel.
    pub fn set(&mut self, field: InvoiceField, value: impl Into<String>) {
        let value = value.into();
        self.values[field.index()] = if value.trim().is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            value
        };
    }

    /// Whether the model supplied a real value for `field`.
    pub fn is_available(&self, field: InvoiceField) -> bool {
        self.get(field) != NOT_AVAILABLE
    }

    pub fn available_count(&self) -> usize {
        InvoiceField::ALL
            .into_iter()
            .filter(|field| self.is_available(*field))
            .count()
    }

    /// Fields and values in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (InvoiceField, &str)> {
        InvoiceField::ALL
            .into_iter()
            .map(move |field| (field, self.get(field)))
    }

    /// Map keyed by display name.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(field, value)| (field.as_str().to_string(), value.to_string()))
            .collect()
    }
}

impl Serialize for InvoiceFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(InvoiceField::COUNT))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}
