//! Pairing of invoice line items with purchase order line items.

use std::collections::HashSet;

use crate::models::record::LineItem;

/// Pairs of positions into the invoice and PO line-item lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinePairing {
    /// `(invoice position, po position)`, ordered by invoice position.
    pub pairs: Vec<(usize, usize)>,
    /// Invoice positions with no PO counterpart.
    pub unmatched_invoice: Vec<usize>,
    /// PO positions with no invoice counterpart.
    pub unmatched_po: Vec<usize>,
}

impl LinePairing {
    pub fn is_complete(&self) -> bool {
        self.unmatched_invoice.is_empty() && self.unmatched_po.is_empty()
    }
}

/// Pair line items.
///
/// Lines are first paired by exact normalized description, each PO line used
/// at most once and the first unused match winning. If both documents have
/// the same number of lines, the lines still unpaired are then aligned in
/// order. Anything else stays unmatched; it is never guessed.
pub fn pair_line_items(invoice: &[LineItem], po: &[LineItem]) -> LinePairing {
    let mut pairing = LinePairing::default();
    let mut used_po: HashSet<usize> = HashSet::new();
    let mut leftover_invoice = Vec::new();

    let po_keys: Vec<Option<String>> = po.iter().map(|item| item.match_key()).collect();

    for (i, item) in invoice.iter().enumerate() {
        let matched = item.match_key().and_then(|key| {
            po_keys
                .iter()
                .enumerate()
                .find(|(j, po_key)| !used_po.contains(j) && po_key.as_deref() == Some(key.as_str()))
                .map(|(j, _)| j)
        });
        match matched {
            Some(j) => {
                used_po.insert(j);
                pairing.pairs.push((i, j));
            }
            None => leftover_invoice.push(i),
        }
    }

    let leftover_po: Vec<usize> = (0..po.len()).filter(|j| !used_po.contains(j)).collect();

    if invoice.len() == po.len() {
        pairing
            .pairs
            .extend(leftover_invoice.iter().copied().zip(leftover_po.iter().copied()));
    } else {
        pairing.unmatched_invoice = leftover_invoice;
        pairing.unmatched_po = leftover_po;
    }

    pairing.pairs.sort_unstable();
    pairing
}
