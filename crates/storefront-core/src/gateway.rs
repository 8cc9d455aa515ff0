//! # Payment Gateway Adapter
//!
//! Builds signed redirect URLs for a VNPay-compatible processor and verifies
//! the signatures on its callbacks. Pure functions of their inputs: no clock,
//! no network, no payment state.
//!
//! ## Canonicalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  params (BTreeMap, so already sorted by name)                           │
//! │      │                                                                  │
//! │      ├── drop empty values                                              │
//! │      │                                                                  │
//! │      ├── hash payload:  name=formEncode(value) & ...                    │
//! │      │        │                                                         │
//! │      │        ▼                                                         │
//! │      │   HMAC-SHA512(secret, payload) ──► lowercase hex signature       │
//! │      │                                                                  │
//! │      └── query string:  formEncode(name)=formEncode(value) & ...        │
//! │                         & vnp_SecureHash=<signature>                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Form encoding is `application/x-www-form-urlencoded`: space becomes `+`,
//! and only `*-._` plus alphanumerics pass through unescaped.
//!
//! The hash secret never leaves this module: it is not in any URL, log line
//! or error message.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use url::form_urlencoded;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_payment_amount;

type HmacSha512 = Hmac<Sha512>;

/// Gateway parameters, ordered by name.
pub type GatewayParams = BTreeMap<String, String>;

pub const VERSION: &str = "2.1.0";
pub const COMMAND_PAY: &str = "pay";
pub const CURRENCY: &str = "VND";
pub const ORDER_TYPE: &str = "billpayment";
pub const LOCALE: &str = "vn";
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Gateway response code for a successful payment.
pub const RESPONSE_SUCCESS: &str = "00";

/// Redirects expire this long after creation.
pub const EXPIRY_MINUTES: i64 = 15;

/// Gateway timestamps are local to Asia/Ho_Chi_Minh (UTC+7, no DST).
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// =============================================================================
// Configuration
// =============================================================================

/// Merchant credentials and endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub tmn_code: String,
    #[serde(skip_serializing)]
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub ipn_url: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<redacted>")
            .field("pay_url", &self.pay_url)
            .field("return_url", &self.return_url)
            .field("ipn_url", &self.ipn_url)
            .finish()
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Formats `at` as a gateway timestamp (`yyyyMMddHHmmss`, UTC+7).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS).unwrap_or(Utc.fix());
    at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}

/// Assembles the unsigned parameter set for one payment.
///
/// An empty or absent client IP falls back to `127.0.0.1`.
pub fn build_payment_params(
    config: &GatewayConfig,
    payment_id: &str,
    amount: Money,
    client_ip: Option<&str>,
    now: DateTime<Utc>,
) -> GatewayParams {
    let client_ip = client_ip
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(DEFAULT_CLIENT_IP);

    let entries = [
        ("vnp_Version", VERSION.to_string()),
        ("vnp_Command", COMMAND_PAY.to_string()),
        ("vnp_TmnCode", config.tmn_code.clone()),
        ("vnp_Amount", amount.minor_units().to_string()),
        ("vnp_CurrCode", CURRENCY.to_string()),
        ("vnp_TxnRef", payment_id.to_string()),
        ("vnp_OrderInfo", format!("Thanh toan don hang: {payment_id}")),
        ("vnp_OrderType", ORDER_TYPE.to_string()),
        ("vnp_Locale", LOCALE.to_string()),
        ("vnp_ReturnUrl", config.return_url.clone()),
        ("vnp_IpnUrl", config.ipn_url.clone()),
        ("vnp_CreateDate", format_timestamp(now)),
        ("vnp_ExpireDate", format_timestamp(now + Duration::minutes(EXPIRY_MINUTES))),
        ("vnp_IpAddr", client_ip.to_string()),
    ];

    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Builds the full signed redirect URL.
///
/// Fails with `InvalidAmount` when `amount` is not strictly positive.
pub fn build_redirect_url(
    config: &GatewayConfig,
    payment_id: &str,
    amount: Money,
    client_ip: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<String> {
    validate_payment_amount(amount)?;

    let params = build_payment_params(config, payment_id, amount, client_ip, now);
    let signature = sign(&config.hash_secret, &hash_payload(&params))?;

    Ok(format!(
        "{}?{}&{}={}",
        config.pay_url,
        query_string(&params),
        SECURE_HASH,
        signature
    ))
}

fn form_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn non_empty(params: &GatewayParams) -> impl Iterator<Item = (&String, &String)> {
    params.iter().filter(|(_, value)| !value.is_empty())
}

/// `name=formEncode(value)` pairs joined by `&`. Names are not encoded.
pub fn hash_payload(params: &GatewayParams) -> String {
    non_empty(params)
        .map(|(name, value)| format!("{}={}", name, form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `formEncode(name)=formEncode(value)` pairs joined by `&`.
pub fn query_string(params: &GatewayParams) -> String {
    non_empty(params)
        .map(|(name, value)| format!("{}={}", form_encode(name), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA512 over `payload`, as lowercase hex.
pub fn sign(secret: &str, payload: &str) -> CoreResult<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| CoreError::SigningKey)?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// =============================================================================
// Inbound
// =============================================================================

/// Verifies the signature on a callback parameter set.
///
/// The provided `vnp_SecureHash` must be exactly the lowercase hex digest
/// that [`sign`] produces. A missing, empty, upper-case or otherwise
/// different signature fails. Comparison is constant time.
pub fn verify_callback(secret: &str, params: &GatewayParams) -> bool {
    let provided = match params.get(SECURE_HASH) {
        Some(sig) if is_lower_hex(sig) => sig,
        _ => return false,
    };

    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    let signed: GatewayParams = params
        .iter()
        .filter(|(name, _)| name.as_str() != SECURE_HASH && name.as_str() != SECURE_HASH_TYPE)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(hash_payload(&signed).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

fn is_lower_hex(sig: &str) -> bool {
    !sig.is_empty() && sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// What the gateway says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackOutcome {
    Paid,
    Failed,
}

/// The fields of a verified callback the lifecycle manager acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReport {
    /// `vnp_TxnRef`
    pub payment_id: String,
    /// `vnp_Amount`, already in minor units.
    pub amount: Money,
    /// `vnp_TransactionNo`
    pub transaction_no: Option<String>,
    pub response_code: String,
    pub outcome: CallbackOutcome,
}

impl CallbackReport {
    /// Extracts the report from callback parameters.
    ///
    /// Only `vnp_ResponseCode == "00"` (and `vnp_TransactionStatus == "00"`
    /// when that field is present) counts as paid.
    pub fn from_params(params: &GatewayParams) -> CoreResult<Self> {
        let field = |name: &str| non_blank(params, name);

        let payment_id = field("vnp_TxnRef").ok_or_else(|| ValidationError::Required {
            field: "vnp_TxnRef".to_string(),
        })?;

        let raw_amount = field("vnp_Amount").ok_or_else(|| ValidationError::Required {
            field: "vnp_Amount".to_string(),
        })?;
        let amount = raw_amount
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "vnp_Amount".to_string(),
                reason: "must be an integer amount in minor units".to_string(),
            })?;

        let response_code = field("vnp_ResponseCode").unwrap_or_default().to_string();
        let transaction_ok = field("vnp_TransactionStatus").map_or(true, |s| s == RESPONSE_SUCCESS);

        let outcome = if response_code == RESPONSE_SUCCESS && transaction_ok {
            CallbackOutcome::Paid
        } else {
            CallbackOutcome::Failed
        };

        Ok(CallbackReport {
            payment_id: payment_id.to_string(),
            amount: Money::from_minor(amount),
            transaction_no: field("vnp_TransactionNo").map(str::to_string),
            response_code,
            outcome,
        })
    }
}

fn non_blank<'a>(params: &'a GatewayParams, name: &str) -> Option<&'a str> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "TESTSECRET";

    fn config() -> GatewayConfig {
        GatewayConfig {
            tmn_code: "DEMO0001".to_string(),
            hash_secret: SECRET.to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://shop.example/payment/return".to_string(),
            ipn_url: "https://shop.example/payment/ipn".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 5, 0, 0).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> GatewayParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn signed_callback(pairs: &[(&str, &str)]) -> GatewayParams {
        let mut p = params(pairs);
        let sig = sign(SECRET, &hash_payload(&p)).unwrap();
        p.insert(SECURE_HASH.to_string(), sig);
        p.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());
        p
    }

    fn paid_callback() -> GatewayParams {
        signed_callback(&[
            ("vnp_Amount", "223000000"),
            ("vnp_ResponseCode", "00"),
            ("vnp_TransactionNo", "14123456"),
            ("vnp_TransactionStatus", "00"),
            ("vnp_TxnRef", "p-1"),
        ])
    }

    #[test]
    fn test_sign_known_answer() {
        assert_eq!(
            sign(SECRET, "vnp_Amount=1000000&vnp_TxnRef=abc").unwrap(),
            "9b2d7e83b00e8ce814d1b79e7097ac6be9be5f9c07c94c54eabfa63d2da4029c\
             7cd735e7102ff962a9517f5fcf8fb37cec979fb93fa9503ede497df3e4b52832"
        );
    }

    #[test]
    fn test_hash_payload_sorts_encodes_and_drops_empty() {
        let p = params(&[
            ("vnp_TxnRef", "p-1"),
            ("vnp_OrderInfo", "Thanh toan don hang: p-1"),
            ("vnp_Empty", ""),
            ("vnp_Command", "pay"),
            ("vnp_Amount", "223000000"),
        ]);
        let payload = hash_payload(&p);
        assert_eq!(
            payload,
            "vnp_Amount=223000000&vnp_Command=pay&vnp_OrderInfo=Thanh+toan+don+hang%3A+p-1&vnp_TxnRef=p-1"
        );
        assert_eq!(
            sign(SECRET, &payload).unwrap(),
            "16716fdb304f2c2531bc11dd499d3f8896dfb470605e500205f5e5b185188ca4\
             1034cb70de5379d6bca01de6c40c567db9e84301d4a90ec1d3211b584ebb6e30"
        );
    }

    #[test]
    fn test_timestamps_are_utc_plus_seven() {
        assert_eq!(format_timestamp(now()), "20250615120000");

        let p = build_payment_params(&config(), "p-1", Money::from_major(2_230_000), None, now());
        assert_eq!(p["vnp_CreateDate"], "20250615120000");
        assert_eq!(p["vnp_ExpireDate"], "20250615121500");
    }

    #[test]
    fn test_payment_params() {
        let p = build_payment_params(&config(), "p-1", Money::from_major(2_230_000), Some(""), now());
        assert_eq!(p["vnp_Amount"], "223000000");
        assert_eq!(p["vnp_TxnRef"], "p-1");
        assert_eq!(p["vnp_OrderInfo"], "Thanh toan don hang: p-1");
        assert_eq!(p["vnp_IpAddr"], DEFAULT_CLIENT_IP);
        assert_eq!(p["vnp_Version"], "2.1.0");
        assert_eq!(p["vnp_CurrCode"], "VND");
        assert_eq!(p.len(), 14);

        let p = build_payment_params(&config(), "p-1", Money::from_major(1), Some("10.0.0.8"), now());
        assert_eq!(p["vnp_IpAddr"], "10.0.0.8");
    }

    #[test]
    fn test_redirect_url_is_signed_and_verifiable() {
        let url = build_redirect_url(&config(), "p-1", Money::from_major(2_230_000), None, now()).unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_Amount=223000000&"));
        assert!(url.contains("vnp_ReturnUrl=https%3A%2F%2Fshop.example%2Fpayment%2Freturn"));
        assert!(!url.contains(SECRET));

        let query = url.split_once('?').unwrap().1;
        let parsed: GatewayParams = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(verify_callback(SECRET, &parsed));
    }

    #[test]
    fn test_redirect_rejects_non_positive_amount() {
        assert!(matches!(
            build_redirect_url(&config(), "p-1", Money::zero(), None, now()),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_verify_accepts_genuine_callback() {
        let p = paid_callback();
        assert!(verify_callback(SECRET, &p));
        assert!(verify_callback(SECRET, &p));
    }

    #[test]
    fn test_verify_rejects_case_changed_signature() {
        let mut p = paid_callback();
        let upper = p[SECURE_HASH].to_uppercase();
        p.insert(SECURE_HASH.to_string(), upper);
        assert!(!verify_callback(SECRET, &p));

        let mut p = paid_callback();
        let sig = p[SECURE_HASH].clone();
        let first_letter = sig.find(|c: char| c.is_ascii_alphabetic()).unwrap();
        let mut mixed = sig.clone();
        mixed.replace_range(
            first_letter..first_letter + 1,
            &sig[first_letter..first_letter + 1].to_uppercase(),
        );
        p.insert(SECURE_HASH.to_string(), mixed);
        assert!(!verify_callback(SECRET, &p));
    }

    #[test]
    fn test_verify_rejects_any_tampered_character() {
        let original = paid_callback();
        for name in original.keys().filter(|k| k.as_str() != SECURE_HASH_TYPE) {
            let value = &original[name];
            for i in 0..value.len() {
                let mut tampered = original.clone();
                let mut chars: Vec<char> = value.chars().collect();
                chars[i] = if chars[i] == '1' { '2' } else { '1' };
                tampered.insert(name.clone(), chars.into_iter().collect());
                assert!(!verify_callback(SECRET, &tampered), "{name}[{i}] tampered");
            }
        }
    }

    #[test]
    fn test_verify_rejects_missing_or_malformed_signature() {
        let mut p = paid_callback();
        p.insert(SECURE_HASH.to_string(), String::new());
        assert!(!verify_callback(SECRET, &p));

        p.insert(SECURE_HASH.to_string(), "not-hex!".to_string());
        assert!(!verify_callback(SECRET, &p));

        p.remove(SECURE_HASH);
        assert!(!verify_callback(SECRET, &p));

        assert!(!verify_callback("OTHERSECRET", &paid_callback()));
    }

    #[test]
    fn test_callback_report_paid() {
        let report = CallbackReport::from_params(&paid_callback()).unwrap();
        assert_eq!(report.payment_id, "p-1");
        assert_eq!(report.amount, Money::from_major(2_230_000));
        assert_eq!(report.transaction_no.as_deref(), Some("14123456"));
        assert_eq!(report.outcome, CallbackOutcome::Paid);
    }

    #[test]
    fn test_callback_report_failed_outcomes() {
        let declined = params(&[("vnp_Amount", "100"), ("vnp_ResponseCode", "24"), ("vnp_TxnRef", "p-1")]);
        assert_eq!(
            CallbackReport::from_params(&declined).unwrap().outcome,
            CallbackOutcome::Failed
        );

        let pending_txn = params(&[
            ("vnp_Amount", "100"),
            ("vnp_ResponseCode", "00"),
            ("vnp_TransactionStatus", "01"),
            ("vnp_TxnRef", "p-1"),
        ]);
        assert_eq!(
            CallbackReport::from_params(&pending_txn).unwrap().outcome,
            CallbackOutcome::Failed
        );
    }

    #[test]
    fn test_callback_report_requires_reference_and_amount() {
        let no_ref = params(&[("vnp_Amount", "100"), ("vnp_ResponseCode", "00")]);
        assert!(matches!(
            CallbackReport::from_params(&no_ref),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let bad_amount = params(&[("vnp_Amount", "12.5"), ("vnp_TxnRef", "p-1")]);
        assert!(matches!(
            CallbackReport::from_params(&bad_amount),
            Err(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialized_config_omits_secret() {
        let json = serde_json::to_value(config()).unwrap();
        assert!(json.get("hash_secret").is_none());
        assert_eq!(json["tmn_code"], "DEMO0001");
        assert!(!json.to_string().contains(SECRET));
    }
}
