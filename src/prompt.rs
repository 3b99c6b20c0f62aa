//! Instruction text sent to the vision model with every invoice image.
//!
//! The field list and the `Field: [value]` template are both generated from
//! [`InvoiceField::ALL`], so the prompt always asks for exactly the fields the
//! parser knows about.

use std::fmt::Write;

use crate::model::{InvoiceField, NOT_AVAILABLE};

impl InvoiceField {
    /// Labels the field commonly carries on invoices, across languages.
    pub fn hints(&self) -> &'static str {
        match self {
            InvoiceField::InvoiceNumber => {
                "invoice #, bill number, 发票号码, Rechnungsnummer, numéro de facture, número de factura"
            }
            InvoiceField::InvoiceDate => {
                "date, billing date, 开票日期, Rechnungsdatum, date de facturation, fecha de factura"
            }
            InvoiceField::InvoiceAmount => {
                "total amount, grand total, 金额, Gesamtbetrag, montant total, importe total"
            }
            InvoiceField::Currency => "the currency symbol or code: $, €, £, ¥",
            InvoiceField::LegalEntityName => {
                "company name, business name, 公司名称, Firmenname, nom de l'entreprise, nombre de la empresa"
            }
            InvoiceField::LegalEntityAddress => {
                "registered address, 地址, Geschäftsadresse, adresse, dirección"
            }
            InvoiceField::VendorName => {
                "vendor, supplier, seller, 供应商, Lieferant, fournisseur, proveedor"
            }
            InvoiceField::VendorAddress => {
                "vendor address, supplier address, 供应商地址, Lieferantenadresse, adresse du fournisseur, dirección del proveedor"
            }
            InvoiceField::PaymentTerms => {
                "payment terms, due date, 付款条件, Zahlungsbedingungen, conditions de paiement, condiciones de pago"
            }
            InvoiceField::PaymentMethod => {
                "payment method, 付款方式, Zahlungsmethode, mode de paiement, método de pago"
            }
            InvoiceField::VatId => {
                "VAT, GST, tax number, 税号, Steuernummer, numéro de TVA, número de IVA"
            }
            InvoiceField::GlAccountNumber => {
                "GL, general ledger, 总账, Hauptbuch, grand livre, libro mayor"
            }
            InvoiceField::BankAccountNumber => {
                "bank account, IBAN, 银行账号, Kontonummer, compte bancaire, cuenta bancaria"
            }
        }
    }
}

/// Build the extraction instructions for the vision model.
///
/// ```
/// let prompt = invoice_ocr::prompt::extraction_prompt();
/// assert!(prompt.contains("VAT ID: [value]"));
/// assert!(prompt.contains("DD/MM/YYYY"));
/// ```
pub fn extraction_prompt() -> String {
    let mut prompt = String::from(
        "You are a multilingual invoice analyzer. First, identify the primary language of the invoice. \
         Then analyze this invoice image and extract the following information, translating all values \
         to English if they are in another language:\n\n",
    );

    for (i, field) in InvoiceField::ALL.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {} (Look for: {}, etc.)", i + 1, field, field.hints());
    }

    prompt.push_str("\nFormat the response as follows:\n");
    for field in InvoiceField::ALL {
        let _ = writeln!(prompt, "{}: [value]", field);
    }

    let _ = write!(
        prompt,
        "\nImportant:\n\
         - If any field is not found, write \"{NOT_AVAILABLE}\"\n\
         - Convert all dates to DD/MM/YYYY format\n\
         - Convert all amounts to standard numerical format (e.g., 1,234.56)\n\
         - Preserve any ID numbers exactly as shown\n\
         - If detecting multiple possible values, choose the most likely one based on context"
    );

    prompt
}
