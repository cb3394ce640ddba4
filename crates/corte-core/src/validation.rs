//! # Validation Rules
//!
//! Pure validation for the sale and return processors. Every rule here runs
//! before any mutation, so a rejected request performs no writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE - business rule validation (pure, no I/O)         │
//! │  Layer 2: corte-db    - CHECK constraints, guarded UPDATEs, atomic      │
//! │                         increments enforcing the same ceilings again    │
//! │                         under concurrency                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult, ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::{
    FulfillmentType, NewReturn, NewReturnItem, NewSale, PaymentMethod, PaymentSpec, PaymentType,
    RefundMethod, Sale, SaleFull,
};

// =============================================================================
// Sale Validation
// =============================================================================

/// Validates a new-sale request: non-empty items, positive quantities,
/// non-negative prices, discount in range, mixed-leg sum invariant, and the
/// courier requirement for delivery fulfillment.
///
/// The open-shift admission check and the stock pre-check need storage and
/// live in the sale processor.
pub fn validate_new_sale(sale: &NewSale) -> ValidationResult<()> {
    if sale.items.is_empty() {
        return Err(ValidationError::EmptyItems);
    }

    for item in &sale.items {
        if item.quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity {
                name: item.name.clone(),
                quantity: item.quantity,
            });
        }
        if item.unit_price_cents < 0 {
            return Err(ValidationError::NegativePrice {
                name: item.name.clone(),
            });
        }
    }

    let subtotal = sale.subtotal();
    if sale.discount_cents < 0 || sale.discount_cents > subtotal.cents() {
        return Err(ValidationError::InvalidDiscount {
            discount_cents: sale.discount_cents,
            subtotal_cents: subtotal.cents(),
        });
    }

    validate_payment_spec(&sale.payment, sale.total())?;

    if sale.fulfillment == FulfillmentType::Domicilio && sale.courier_id.is_none() {
        return Err(ValidationError::CourierRequired);
    }

    Ok(())
}

/// Validates the payment descriptor against the sale total.
///
/// Mixed legs must be non-empty, strictly positive, and sum to the total
/// within one cent (the 0.01 tolerance of the wire format).
pub fn validate_payment_spec(payment: &PaymentSpec, total: Money) -> ValidationResult<()> {
    match payment {
        PaymentSpec::Single { .. } => Ok(()),
        PaymentSpec::Mixed { legs } => {
            if legs.is_empty() {
                return Err(ValidationError::MixedLegsEmpty);
            }
            for leg in legs {
                if leg.amount_cents <= 0 {
                    return Err(ValidationError::NonPositiveLegAmount);
                }
            }
            let legs_sum: Money = legs.iter().map(|l| Money::from_cents(l.amount_cents)).sum();
            if !legs_sum.approx_eq(total) {
                return Err(ValidationError::MixedSumMismatch {
                    legs_cents: legs_sum.cents(),
                    total_cents: total.cents(),
                });
            }
            Ok(())
        }
    }
}

// =============================================================================
// Return Validation
// =============================================================================

/// Key identifying a sale line for cumulative-quantity tracking: the product
/// reference when present, otherwise the frozen display name.
pub fn line_key(product_id: Option<&str>, name: &str) -> String {
    match product_id {
        Some(pid) => pid.to_string(),
        None => name.to_string(),
    }
}

/// Validates refund-method compatibility (spec step 2).
///
/// Single-payment sales refund on the original method, except that card and
/// transfer sales additionally permit cash refunds (cash-out policy).
/// Mixed-payment sales require a `mixedRefunds` breakdown whose legs are
/// each capped by the original leg amount minus what was already refunded on
/// that leg, and whose sum equals the refund amount.
pub fn validate_refund_method(
    sale: &SaleFull,
    request: &NewReturn,
    refunded_by_method: &HashMap<PaymentMethod, i64>,
) -> ValidationResult<()> {
    match sale.sale.payment_type {
        PaymentType::Single => {
            let original = sale
                .pagos
                .first()
                .map(|p| p.metodo)
                // A single-payment sale always persists one leg; treat a
                // missing one as cash so the strictest rule applies.
                .unwrap_or(PaymentMethod::Efectivo);

            let compatible = match (original, request.refund_method) {
                (PaymentMethod::Efectivo, RefundMethod::Efectivo) => true,
                (PaymentMethod::Transferencia, RefundMethod::Transferencia) => true,
                (PaymentMethod::Tarjeta, RefundMethod::Tarjeta) => true,
                // Cash-out policy: card/transfer may refund in cash.
                (PaymentMethod::Transferencia, RefundMethod::Efectivo) => true,
                (PaymentMethod::Tarjeta, RefundMethod::Efectivo) => true,
                _ => false,
            };

            if !compatible {
                return Err(ValidationError::RefundMethodMismatch {
                    requested: request.refund_method,
                });
            }
            Ok(())
        }
        PaymentType::Mixed => {
            if request.refund_method != RefundMethod::Mixto {
                return Err(ValidationError::RefundMethodMismatch {
                    requested: request.refund_method,
                });
            }
            let legs = match request.mixed_refunds.as_deref() {
                Some(legs) if !legs.is_empty() => legs,
                _ => return Err(ValidationError::MixedRefundsRequired),
            };

            // Original amount paid per method.
            let mut paid_by_method: HashMap<PaymentMethod, i64> = HashMap::new();
            for leg in &sale.pagos {
                *paid_by_method.entry(leg.metodo).or_insert(0) += leg.amount_cents;
            }

            let mut legs_sum = Money::zero();
            for leg in legs {
                if leg.amount_cents <= 0 {
                    return Err(ValidationError::NonPositiveLegAmount);
                }
                let paid = paid_by_method.get(&leg.metodo).copied().unwrap_or(0);
                let already = refunded_by_method.get(&leg.metodo).copied().unwrap_or(0);
                let available = paid - already;
                if leg.amount_cents > available {
                    return Err(ValidationError::RefundLegExceedsOriginal {
                        metodo: format!("{:?}", leg.metodo).to_lowercase(),
                        requested_cents: leg.amount_cents,
                        available_cents: available.max(0),
                    });
                }
                legs_sum += Money::from_cents(leg.amount_cents);
            }

            let refund = Money::from_cents(request.refund_amount_cents);
            if !legs_sum.approx_eq(refund) {
                return Err(ValidationError::RefundLegSumMismatch {
                    legs_cents: legs_sum.cents(),
                    refund_cents: refund.cents(),
                });
            }
            Ok(())
        }
    }
}

/// Validates returned items against the original sale lines (spec step 3):
/// every item must match a line by product identity or name, and the
/// cumulative returned quantity across all prior returns plus this request
/// must not exceed the sold quantity.
///
/// `already_returned` maps [`line_key`] to the quantity already returned by
/// prior non-rejected returns.
pub fn validate_return_items(
    sale: &SaleFull,
    items: &[NewReturnItem],
    already_returned: &HashMap<String, i64>,
) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::EmptyReturnItems);
    }

    // Quantities requested within this same request also accumulate.
    let mut requested_so_far: HashMap<String, i64> = HashMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity {
                name: item.name.clone(),
                quantity: item.quantity,
            });
        }

        let line = sale
            .find_item(item.product_id.as_deref(), &item.name)
            .ok_or_else(|| ValidationError::ItemNotOnSale {
                name: item.name.clone(),
            })?;

        let key = line_key(line.product_id.as_deref(), &line.name);
        let prior = already_returned.get(&key).copied().unwrap_or(0);
        let in_request = requested_so_far.entry(key).or_insert(0);
        *in_request += item.quantity;

        if prior + *in_request > line.quantity {
            return Err(ValidationError::QuantityExceedsSold {
                name: line.name.clone(),
                sold: line.quantity,
                already_returned: prior,
                requested: *in_request,
            });
        }
    }

    Ok(())
}

/// Item-level refund value: Σ refundPrice × quantity.
pub fn item_refund_value(items: &[NewReturnItem]) -> Money {
    items
        .iter()
        .map(|i| Money::from_cents(i.refund_price_cents * i.quantity))
        .sum()
}

/// Validates the requested refund amount against the item-level value (spec
/// step 4): the caller may refund less than full item value, never more.
pub fn validate_refund_amount(items: &[NewReturnItem], refund_cents: i64) -> ValidationResult<()> {
    if refund_cents <= 0 {
        return Err(ValidationError::NonPositiveRefund);
    }
    let item_value = item_refund_value(items);
    if refund_cents > item_value.cents() {
        return Err(ValidationError::RefundExceedsItemValue {
            item_value_cents: item_value.cents(),
            refund_cents,
        });
    }
    Ok(())
}

/// Checks the sale's remaining refundable balance (spec step 5). A breach is
/// a conflict, not a validation error: the request was well-formed but the
/// sale has nothing left to refund.
pub fn check_refund_balance(sale: &Sale, refund_cents: i64) -> CoreResult<()> {
    let balance = sale.remaining_refundable();
    if refund_cents > balance.cents() {
        return Err(CoreError::RefundExceedsBalance {
            balance_cents: balance.cents(),
            requested_cents: refund_cents,
        });
    }
    Ok(())
}

// =============================================================================
// Shift Validation
// =============================================================================

/// Opening float must be non-negative.
pub fn validate_opening_float(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::NegativeOpeningFloat);
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FulfillmentType, ItemCondition, NewPaymentLeg, NewRefundLeg, NewSaleItem, PaymentLeg, Sale,
        SaleItem, SaleStatus,
    };
    use chrono::Utc;

    fn sale_item(product_id: Option<&str>, name: &str, qty: i64, price: i64) -> NewSaleItem {
        NewSaleItem {
            product_id: product_id.map(String::from),
            name: name.into(),
            quantity: qty,
            unit_price_cents: price,
            note: None,
        }
    }

    fn new_sale(items: Vec<NewSaleItem>, payment: PaymentSpec) -> NewSale {
        NewSale {
            tienda_id: Some("tienda-1".into()),
            customer_id: None,
            courier_id: None,
            items,
            discount_cents: 0,
            payment,
            fulfillment: FulfillmentType::Mostrador,
            notes: None,
        }
    }

    fn cash_single() -> PaymentSpec {
        PaymentSpec::Single {
            metodo: PaymentMethod::Efectivo,
            reference: None,
            received_cents: None,
        }
    }

    fn full_sale(payment_type: PaymentType, legs: Vec<(PaymentMethod, i64)>) -> SaleFull {
        let now = Utc::now();
        SaleFull {
            sale: Sale {
                id: "sale-1".into(),
                tenant_id: "t".into(),
                tienda_id: "tienda-1".into(),
                user_id: "u".into(),
                customer_id: None,
                courier_id: None,
                payment_type,
                fulfillment: FulfillmentType::Mostrador,
                status: SaleStatus::EntregadoYCobrado,
                discount_cents: 0,
                total_cents: legs.iter().map(|(_, a)| a).sum(),
                total_returned_cents: 0,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![SaleItem {
                id: "i1".into(),
                sale_id: "sale-1".into(),
                product_id: Some("prod-1".into()),
                name: "Widget".into(),
                quantity: 2,
                unit_price_cents: 10000,
                note: None,
                created_at: now,
            }],
            pagos: legs
                .into_iter()
                .enumerate()
                .map(|(n, (metodo, amount_cents))| PaymentLeg {
                    id: format!("p{n}"),
                    sale_id: "sale-1".into(),
                    metodo,
                    amount_cents,
                    reference: None,
                    received_cents: None,
                    created_at: now,
                })
                .collect(),
        }
    }

    fn return_request(refund_method: RefundMethod, refund_cents: i64) -> NewReturn {
        NewReturn {
            sale_id: "sale-1".into(),
            items: vec![NewReturnItem {
                product_id: Some("prod-1".into()),
                name: "Widget".into(),
                quantity: 1,
                refund_price_cents: 10000,
                reason: "defect".into(),
                condition: ItemCondition::Nuevo,
            }],
            refund_amount_cents: refund_cents,
            refund_method,
            mixed_refunds: None,
            notes: None,
        }
    }

    #[test]
    fn test_empty_items_rejected() {
        let sale = new_sale(vec![], cash_single());
        assert_eq!(validate_new_sale(&sale), Err(ValidationError::EmptyItems));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let sale = new_sale(vec![sale_item(None, "A", 0, 100)], cash_single());
        assert!(matches!(
            validate_new_sale(&sale),
            Err(ValidationError::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn test_mixed_sum_invariant() {
        let items = vec![sale_item(None, "A", 1, 10000)];

        // Legs that sum exactly
        let ok = new_sale(
            items.clone(),
            PaymentSpec::Mixed {
                legs: vec![
                    NewPaymentLeg {
                        metodo: PaymentMethod::Efectivo,
                        amount_cents: 6000,
                        reference: None,
                        received_cents: None,
                    },
                    NewPaymentLeg {
                        metodo: PaymentMethod::Tarjeta,
                        amount_cents: 4000,
                        reference: None,
                        received_cents: None,
                    },
                ],
            },
        );
        assert!(validate_new_sale(&ok).is_ok());

        // One cent off is within tolerance
        let near = new_sale(
            items.clone(),
            PaymentSpec::Mixed {
                legs: vec![NewPaymentLeg {
                    metodo: PaymentMethod::Efectivo,
                    amount_cents: 9999,
                    reference: None,
                    received_cents: None,
                }],
            },
        );
        assert!(validate_new_sale(&near).is_ok());

        // Two cents off is a mismatch
        let bad = new_sale(
            items,
            PaymentSpec::Mixed {
                legs: vec![NewPaymentLeg {
                    metodo: PaymentMethod::Efectivo,
                    amount_cents: 9998,
                    reference: None,
                    received_cents: None,
                }],
            },
        );
        assert!(matches!(
            validate_new_sale(&bad),
            Err(ValidationError::MixedSumMismatch { .. })
        ));
    }

    #[test]
    fn test_courier_required_for_domicilio() {
        let mut sale = new_sale(vec![sale_item(None, "A", 1, 100)], cash_single());
        sale.fulfillment = FulfillmentType::Domicilio;
        assert_eq!(
            validate_new_sale(&sale),
            Err(ValidationError::CourierRequired)
        );

        sale.courier_id = Some("courier-1".into());
        assert!(validate_new_sale(&sale).is_ok());
    }

    #[test]
    fn test_cash_out_policy() {
        let refunded = HashMap::new();

        // Cash sale refunds in cash only
        let cash_sale = full_sale(PaymentType::Single, vec![(PaymentMethod::Efectivo, 20000)]);
        assert!(validate_refund_method(
            &cash_sale,
            &return_request(RefundMethod::Efectivo, 10000),
            &refunded
        )
        .is_ok());
        assert!(validate_refund_method(
            &cash_sale,
            &return_request(RefundMethod::Tarjeta, 10000),
            &refunded
        )
        .is_err());

        // Card sale may refund in cash
        let card_sale = full_sale(PaymentType::Single, vec![(PaymentMethod::Tarjeta, 20000)]);
        assert!(validate_refund_method(
            &card_sale,
            &return_request(RefundMethod::Efectivo, 10000),
            &refunded
        )
        .is_ok());
        assert!(validate_refund_method(
            &card_sale,
            &return_request(RefundMethod::Tarjeta, 10000),
            &refunded
        )
        .is_ok());
        assert!(validate_refund_method(
            &card_sale,
            &return_request(RefundMethod::Transferencia, 10000),
            &refunded
        )
        .is_err());
    }

    #[test]
    fn test_mixed_refund_leg_cap() {
        let sale = full_sale(
            PaymentType::Mixed,
            vec![
                (PaymentMethod::Efectivo, 6000),
                (PaymentMethod::Tarjeta, 4000),
            ],
        );
        let refunded = HashMap::new();

        // Scenario E: card leg of 50 against an original 40 is rejected
        let mut req = return_request(RefundMethod::Mixto, 5000);
        req.mixed_refunds = Some(vec![NewRefundLeg {
            metodo: PaymentMethod::Tarjeta,
            amount_cents: 5000,
        }]);
        assert!(matches!(
            validate_refund_method(&sale, &req, &refunded),
            Err(ValidationError::RefundLegExceedsOriginal { .. })
        ));

        // Within the leg cap it passes
        req.refund_amount_cents = 4000;
        req.mixed_refunds = Some(vec![NewRefundLeg {
            metodo: PaymentMethod::Tarjeta,
            amount_cents: 4000,
        }]);
        assert!(validate_refund_method(&sale, &req, &refunded).is_ok());

        // Prior refunds shrink the cap
        let mut prior = HashMap::new();
        prior.insert(PaymentMethod::Tarjeta, 3000);
        assert!(matches!(
            validate_refund_method(&sale, &req, &prior),
            Err(ValidationError::RefundLegExceedsOriginal { .. })
        ));
    }

    #[test]
    fn test_mixed_sale_requires_breakdown() {
        let sale = full_sale(
            PaymentType::Mixed,
            vec![
                (PaymentMethod::Efectivo, 6000),
                (PaymentMethod::Tarjeta, 4000),
            ],
        );
        let refunded = HashMap::new();

        let req = return_request(RefundMethod::Mixto, 5000);
        assert_eq!(
            validate_refund_method(&sale, &req, &refunded),
            Err(ValidationError::MixedRefundsRequired)
        );

        let req = return_request(RefundMethod::Efectivo, 5000);
        assert!(matches!(
            validate_refund_method(&sale, &req, &refunded),
            Err(ValidationError::RefundMethodMismatch { .. })
        ));
    }

    #[test]
    fn test_cumulative_quantity_ceiling() {
        let sale = full_sale(PaymentType::Single, vec![(PaymentMethod::Efectivo, 20000)]);

        // Sold 2, already returned 1, requesting 1 more is fine
        let mut prior = HashMap::new();
        prior.insert("prod-1".to_string(), 1);
        let items = vec![NewReturnItem {
            product_id: Some("prod-1".into()),
            name: "Widget".into(),
            quantity: 1,
            refund_price_cents: 10000,
            reason: "defect".into(),
            condition: ItemCondition::Nuevo,
        }];
        assert!(validate_return_items(&sale, &items, &prior).is_ok());

        // Requesting 2 more would exceed the sold 2
        let items = vec![NewReturnItem {
            product_id: Some("prod-1".into()),
            name: "Widget".into(),
            quantity: 2,
            refund_price_cents: 10000,
            reason: "defect".into(),
            condition: ItemCondition::Nuevo,
        }];
        assert!(matches!(
            validate_return_items(&sale, &items, &prior),
            Err(ValidationError::QuantityExceedsSold { .. })
        ));
    }

    #[test]
    fn test_unknown_item_rejected() {
        let sale = full_sale(PaymentType::Single, vec![(PaymentMethod::Efectivo, 20000)]);
        let items = vec![NewReturnItem {
            product_id: Some("prod-other".into()),
            name: "Gizmo".into(),
            quantity: 1,
            refund_price_cents: 100,
            reason: "defect".into(),
            condition: ItemCondition::Nuevo,
        }];
        assert!(matches!(
            validate_return_items(&sale, &items, &HashMap::new()),
            Err(ValidationError::ItemNotOnSale { .. })
        ));
    }

    #[test]
    fn test_refund_amount_capped_by_item_value() {
        let items = vec![NewReturnItem {
            product_id: None,
            name: "Widget".into(),
            quantity: 1,
            refund_price_cents: 10000,
            reason: "defect".into(),
            condition: ItemCondition::Nuevo,
        }];
        assert!(validate_refund_amount(&items, 10000).is_ok());
        assert!(validate_refund_amount(&items, 5000).is_ok());
        assert!(matches!(
            validate_refund_amount(&items, 10001),
            Err(ValidationError::RefundExceedsItemValue { .. })
        ));
        assert_eq!(
            validate_refund_amount(&items, 0),
            Err(ValidationError::NonPositiveRefund)
        );
    }

    #[test]
    fn test_refund_balance_ceiling() {
        let mut sale = full_sale(PaymentType::Single, vec![(PaymentMethod::Efectivo, 20000)]);
        sale.sale.total_returned_cents = 15000;
        assert!(check_refund_balance(&sale.sale, 5000).is_ok());
        assert!(matches!(
            check_refund_balance(&sale.sale, 5001),
            Err(CoreError::RefundExceedsBalance { .. })
        ));
    }

    #[test]
    fn test_opening_float() {
        assert!(validate_opening_float(0).is_ok());
        assert!(validate_opening_float(100).is_ok());
        assert!(validate_opening_float(-1).is_err());
    }
}
