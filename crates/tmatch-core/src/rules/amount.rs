//! amount_authorization: the invoice does not bill more than the PO allows.

use crate::models::document::DocumentRole;
use crate::models::record::{fields, DocumentBundle};
use crate::models::verification::CheckResult;

use super::{Inputs, Rule, RuleOutcome, AMOUNT_AUTHORIZATION};

/// Invoice total must not exceed the PO authorized amount in the same
/// currency. Equality passes. Currencies are never converted; a mismatch
/// fails the check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountAuthorizationRule;

impl Rule for AmountAuthorizationRule {
    fn name(&self) -> &'static str {
        AMOUNT_AUTHORIZATION
    }

    fn evaluate(&self, bundle: &DocumentBundle) -> RuleOutcome {
        let mut inputs = Inputs::new(bundle);
        let total = inputs.money(DocumentRole::Invoice, fields::TOTAL_AMOUNT);
        let authorized = inputs.money(DocumentRole::PurchaseOrder, fields::AUTHORIZED_AMOUNT);

        let (Some(total), Some(authorized)) = (total, authorized) else {
            return inputs.fail_missing(AMOUNT_AUTHORIZATION);
        };

        if total.currency() != authorized.currency() {
            let check = CheckResult::fail(
                AMOUNT_AUTHORIZATION,
                format!(
                    "Currency mismatch: invoice total in {}, purchase order authorized in {}",
                    total.currency(),
                    authorized.currency()
                ),
            )
            .detail("invoice_currency", total.currency().code())
            .detail("po_currency", authorized.currency().code());
            return inputs.finish(check);
        }

        let Some(difference) = total.checked_sub(authorized) else {
            let check = CheckResult::fail(AMOUNT_AUTHORIZATION, "Amounts out of range");
            return inputs.finish(check);
        };

        let check = if difference.minor_units() > 0 {
            CheckResult::fail(
                AMOUNT_AUTHORIZATION,
                format!(
                    "Invoice total {} exceeds authorized amount {} by {}",
                    total, authorized, difference
                ),
            )
            .detail("excess", difference.amount_string())
        } else {
            CheckResult::pass(
                AMOUNT_AUTHORIZATION,
                format!("Invoice total {} within authorized amount {}", total, authorized),
            )
        };
        let check = check
            .detail("invoice_total", total.amount_string())
            .detail("authorized_amount", authorized.amount_string())
            .detail("currency", total.currency().code());
        inputs.finish(check)
    }
}
