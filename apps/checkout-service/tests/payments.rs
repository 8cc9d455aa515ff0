//! Gateway redirects, callbacks and manual payment overrides.

mod common;

use std::collections::HashMap;

use checkout_service::{CheckoutError, ErrorKind};
use common::*;
use storefront_core::gateway::SECURE_HASH;
use storefront_core::{Money, Order, Payment, PaymentStatus};

async fn vnpay_order(h: &Harness) -> (Order, Payment) {
    h.stock(MUG, 10).await;
    let mut req = request(&[(MUG, 2)]);
    req.payment_method = Some("VNPAY".to_string());

    let order = h.orders.create_order(&alice(), req).await.unwrap();
    let payment = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    (order, payment)
}

fn query_pairs(url: &str) -> HashMap<String, String> {
    let (_, query) = url.split_once('?').unwrap();
    url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

#[tokio::test]
async fn test_redirect_carries_signed_payment_params() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let url = h
        .payments
        .build_payment_redirect(&payment.id, payment.amount, None)
        .await
        .unwrap();
    assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

    let params = query_pairs(&url);
    assert_eq!(params["vnp_TxnRef"], payment.id);
    assert_eq!(params["vnp_Amount"], order.total_price.minor_units().to_string());
    assert_eq!(params["vnp_TmnCode"], "TEST0001");
    assert_eq!(params["vnp_IpAddr"], "127.0.0.1");
    // 12:00 UTC is 19:00 in Ho Chi Minh City.
    assert_eq!(params["vnp_CreateDate"], "20240601190000");
    assert_eq!(params["vnp_ExpireDate"], "20240601191500");
    assert_eq!(params[SECURE_HASH].len(), 128);
    assert!(!url.contains(SECRET));

    let err = h
        .payments
        .build_payment_redirect(&payment.id, Money::zero(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_redirect_requires_a_recorded_payment() {
    let h = harness().await;
    let (_, payment) = vnpay_order(&h).await;

    let err = h
        .payments
        .build_payment_redirect("no-such-payment", Money::from_major(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound { ref entity, .. } if entity == "Payment"));

    let err = h
        .payments
        .build_payment_redirect(&payment.id, payment.amount - Money::from_major(1), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_successful_callback_marks_paid_once() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let callback = signed_callback(&payment.id, order.total_price, "00", "14123456");
    assert!(h.payments.handle_payment_callback(&callback).await.unwrap());

    let paid = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.transaction_id.as_deref(), Some("14123456"));

    // Replays are accepted and change nothing.
    h.clock.advance(chrono::Duration::minutes(1));
    assert!(h.payments.handle_payment_callback(&callback).await.unwrap());
    let again = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(again, paid);

    // A late failure report does not undo the payment.
    let failure = signed_callback(&payment.id, order.total_price, "24", "14123457");
    assert!(h.payments.handle_payment_callback(&failure).await.unwrap());
    let still = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(still.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_failed_callback_marks_failed() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let callback = signed_callback(&payment.id, order.total_price, "24", "0");
    assert!(!h.payments.handle_payment_callback(&callback).await.unwrap());

    let failed = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn test_tampered_callback_is_rejected() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let mut callback = signed_callback(&payment.id, order.total_price, "24", "14123456");
    callback.insert("vnp_ResponseCode".to_string(), "00".to_string());

    let err = h.payments.handle_payment_callback(&callback).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);

    let mut shouted = signed_callback(&payment.id, order.total_price, "00", "14123456");
    let upper = shouted[SECURE_HASH].to_uppercase();
    shouted.insert(SECURE_HASH.to_string(), upper);
    let err = h.payments.handle_payment_callback(&shouted).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);

    let mut unsigned = signed_callback(&payment.id, order.total_price, "00", "14123456");
    unsigned.remove(SECURE_HASH);
    let err = h.payments.handle_payment_callback(&unsigned).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);

    let untouched = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(untouched.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_amount_mismatch_is_an_integrity_failure() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let short = order.total_price - Money::from_major(1);
    let callback = signed_callback(&payment.id, short, "00", "14123456");

    let err = h.payments.handle_payment_callback(&callback).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityFailure);

    let untouched = h.payments.get_payment_by_order(&alice(), &order.id).await.unwrap();
    assert_eq!(untouched.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_callback_for_unknown_payment() {
    let h = harness().await;

    let callback = signed_callback("no-such-payment", Money::from_major(1_000), "00", "1");
    let err = h.payments.handle_payment_callback(&callback).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_manual_override_and_lookups() {
    let h = harness().await;
    let (order, payment) = vnpay_order(&h).await;

    let err = h
        .payments
        .update_payment_status(&alice(), &payment.id, PaymentStatus::Paid, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let updated = h
        .payments
        .update_payment_status(&staff(), &payment.id, PaymentStatus::AwaitingDelivery, Some("COD-778"))
        .await
        .unwrap();
    assert_eq!(updated.status, PaymentStatus::AwaitingDelivery);

    let found = h.payments.get_payment_by_transaction(&admin(), "COD-778").await.unwrap();
    assert_eq!(found.order_id, order.id);

    let err = h.payments.get_payment_by_transaction(&alice(), "COD-778").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h.payments.get_payment_by_order(&bob(), &order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h
        .payments
        .update_payment_status(&admin(), "missing", PaymentStatus::Paid, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
