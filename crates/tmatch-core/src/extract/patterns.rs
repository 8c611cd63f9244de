//! Label patterns for plain-text trade documents.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::document::DocumentRole;
use crate::models::record::fields;

/// Build a `Label: value` line pattern. The value is capture group 1.
fn labelled(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)^[ \t]*(?:{})[ \t]*[:#][ \t]*(.+?)[ \t]*$", label)).unwrap()
}

lazy_static! {
    pub static ref INVOICE_NUMBER: Regex = labelled(r"invoice\s*(?:no\.?|number|num\.?|id)");
    pub static ref PO_NUMBER: Regex = labelled(
        r"p\.?\s*o\.?\s*(?:no\.?|number|ref(?:erence)?)|reference\s+p\.?\s*o\.?|purchase\s+order(?:\s*(?:no\.?|number|ref(?:erence)?))?"
    );
    pub static ref DELIVERY_REFERENCE: Regex = labelled(
        r"(?:delivery|d\.?\s*o\.?|pod|delivery\s+order)\s*(?:ref(?:erence)?|no\.?|number)"
    );
    pub static ref INVOICE_REFERENCE: Regex = labelled(r"invoice\s*(?:ref(?:erence)?|no\.?|number)");
    pub static ref CURRENCY: Regex = labelled(r"currency");

    pub static ref TOTAL_AMOUNT: Regex = labelled(
        r"total(?:\s+amount)?|amount\s+due|grand\s+total|invoice\s+total|total\s+due"
    );
    pub static ref AUTHORIZED_AMOUNT: Regex = labelled(
        r"(?:total\s+)?authori[sz]ed\s+(?:amount|total)|p\.?\s*o\.?\s+(?:amount|total)|order\s+total|total(?:\s+amount)?"
    );

    pub static ref DUE_DATE: Regex = labelled(r"(?:payment\s+)?due(?:\s+date)?");
    pub static ref INVOICE_DATE: Regex = labelled(r"invoice\s+date|date\s+of\s+issue|issue\s+date|date");
    pub static ref PO_DATE: Regex = labelled(r"p\.?\s*o\.?\s+date|order\s+date|date");
    pub static ref DELIVERY_DATE: Regex = labelled(
        r"delivery\s+date|date\s+(?:delivered|received)|(?:delivered|received)\s+on|date"
    );

    pub static ref PAYEE_NAME: Regex = labelled(r"vendor|seller|supplier|payee|bill\s+from|from");
    pub static ref PAYER_NAME: Regex = labelled(r"bill\s+to|sold\s+to|buyer|customer|payer|to");
    pub static ref BUYER_NAME: Regex = labelled(r"buyer|ordered\s+by|bill\s+to|customer|from");
    pub static ref VENDOR_NAME: Regex = labelled(r"vendor|supplier|seller|to");
    pub static ref RECIPIENT_NAME: Regex = labelled(
        r"received\s+by|recipient|consignee|deliver(?:ed)?\s+to"
    );

    pub static ref TOTAL_QUANTITY: Regex = labelled(r"total\s+(?:quantity|qty)|quantity|qty");
    pub static ref QUANTITY_DELIVERED: Regex = labelled(
        r"(?:total\s+)?(?:quantity|qty)(?:\s+(?:delivered|received))?|(?:delivered|received)\s+(?:quantity|qty)"
    );

    // Table separator rows: |---|:---:|
    pub static ref TABLE_RULE: Regex = Regex::new(r"^[\s|:\-+=]+$").unwrap();
}

/// Labels recognized on each document, most specific first. The first label
/// matching a line claims it.
pub fn labels_for(role: DocumentRole) -> Vec<(&'static Regex, &'static str)> {
    match role {
        DocumentRole::Invoice => vec![
            (&*INVOICE_NUMBER, fields::INVOICE_NUMBER),
            (&*PO_NUMBER, fields::PO_REFERENCE),
            (&*CURRENCY, fields::CURRENCY),
            (&*TOTAL_QUANTITY, fields::TOTAL_QUANTITY),
            (&*TOTAL_AMOUNT, fields::TOTAL_AMOUNT),
            (&*DUE_DATE, fields::DUE_DATE),
            (&*INVOICE_DATE, fields::INVOICE_DATE),
            (&*PAYER_NAME, fields::PAYER_NAME),
            (&*PAYEE_NAME, fields::PAYEE_NAME),
        ],
        DocumentRole::PurchaseOrder => vec![
            (&*PO_NUMBER, fields::PO_NUMBER),
            (&*CURRENCY, fields::CURRENCY),
            (&*TOTAL_QUANTITY, fields::TOTAL_QUANTITY),
            (&*AUTHORIZED_AMOUNT, fields::AUTHORIZED_AMOUNT),
            (&*PO_DATE, fields::PO_DATE),
            (&*BUYER_NAME, fields::BUYER_NAME),
            (&*VENDOR_NAME, fields::VENDOR_NAME),
        ],
        DocumentRole::ProofOfDelivery => vec![
            (&*DELIVERY_REFERENCE, fields::DELIVERY_REFERENCE),
            (&*PO_NUMBER, fields::PO_REFERENCE),
            (&*INVOICE_REFERENCE, fields::INVOICE_REFERENCE),
            (&*QUANTITY_DELIVERED, fields::QUANTITY_DELIVERED),
            (&*DELIVERY_DATE, fields::DELIVERY_DATE),
            (&*RECIPIENT_NAME, fields::RECIPIENT_NAME),
        ],
    }
}

/// Map a table header cell to a line-item attribute.
pub fn column_attribute(header: &str) -> Option<&'static str> {
    let header = header.trim().to_lowercase();
    let header = header.trim_end_matches('.');
    match header {
        "description" | "item" | "items" | "product" | "goods" | "service" | "desc" => {
            Some(fields::LINE_DESCRIPTION)
        }
        "qty" | "quantity" | "qty delivered" | "qty received" | "quantity delivered"
        | "quantity received" | "received" | "delivered" => Some(fields::LINE_QUANTITY),
        "unit price" | "price" | "rate" | "unit cost" => Some(fields::LINE_UNIT_PRICE),
        "amount" | "total" | "line total" | "line amount" => Some(fields::LINE_AMOUNT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_number_label() {
        let caps = INVOICE_NUMBER.captures("Invoice No: 00000003").unwrap();
        assert_eq!(&caps[1], "00000003");
        let caps = INVOICE_NUMBER.captures("  INVOICE NUMBER # INV-7 ").unwrap();
        assert_eq!(&caps[1], "INV-7");
        assert!(INVOICE_NUMBER.captures("Invoice Date: 1/4/2023").is_none());
    }

    #[test]
    fn test_total_does_not_claim_quantity_lines() {
        assert!(TOTAL_AMOUNT.captures("Total Quantity: 5").is_none());
        assert_eq!(&TOTAL_AMOUNT.captures("Total: S$1,000.00").unwrap()[1], "S$1,000.00");
        assert_eq!(&TOTAL_QUANTITY.captures("Total Quantity: 5").unwrap()[1], "5");
    }

    #[test]
    fn test_po_number_variants() {
        for line in [
            "PO Number: PO-SG-1",
            "P.O. No.: PO-SG-1",
            "Purchase Order: PO-SG-1",
            "Reference PO: PO-SG-1",
        ] {
            assert_eq!(&PO_NUMBER.captures(line).unwrap()[1], "PO-SG-1", "{}", line);
        }
    }

    #[test]
    fn test_authorized_amount_variants() {
        let caps = AUTHORIZED_AMOUNT.captures("Total Authorized Amount: $8,000.00").unwrap();
        assert_eq!(&caps[1], "$8,000.00");
        assert!(AUTHORIZED_AMOUNT.captures("Authorized By: John Smith").is_none());
    }

    #[test]
    fn test_due_date_before_date() {
        assert!(INVOICE_DATE.captures("Due Date: 1/5/2023").is_none());
        assert_eq!(&DUE_DATE.captures("Due Date: 1/5/2023").unwrap()[1], "1/5/2023");
    }

    #[test]
    fn test_column_attribute() {
        assert_eq!(column_attribute(" Qty "), Some(fields::LINE_QUANTITY));
        assert_eq!(column_attribute("Unit Price"), Some(fields::LINE_UNIT_PRICE));
        assert_eq!(column_attribute("No."), None);
    }
}
