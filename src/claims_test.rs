use super::*;
use crate::test_support::make_token;
use serde_json::json;

const NOW: i64 = 1_700_000_000_000;

#[test]
fn decode_reads_camel_case_claims() {
    let token = make_token(&json!({
        "sub": "ana@example.com",
        "userId": 7,
        "firstName": "Ana",
        "admin": true,
        "authProvider": "GOOGLE",
        "profileComplete": false,
        "exp": 1_700_003_600,
    }));
    let claims = Claims::decode(&token).unwrap();
    assert_eq!(claims.sub.as_deref(), Some("ana@example.com"));
    assert_eq!(claims.user_id, Some(7));
    assert_eq!(claims.first_name.as_deref(), Some("Ana"));
    assert_eq!(claims.admin, Some(true));
    assert_eq!(claims.auth_provider, Some(AuthProvider::Google));
    assert_eq!(claims.profile_complete, Some(false));
    assert_eq!(claims.exp, Some(1_700_003_600));
}

#[test]
fn decode_rejects_garbage() {
    assert!(Claims::decode("not-a-jwt").is_none());
    assert!(Claims::decode("a.b").is_none());
    assert!(Claims::decode("a.!!!.c").is_none());
    assert!(Claims::decode("a.b.c.d").is_none());
}

#[test]
fn decode_tolerates_padding() {
    let token = make_token(&json!({ "exp": 1 }));
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    parts[1].push_str("==");
    assert_eq!(Claims::decode(&parts.join(".")).unwrap().exp, Some(1));
}

#[test]
fn minutes_until_expiration_floors() {
    // 90.5 minutes ahead.
    let exp_secs = (NOW + 90 * 60_000 + 30_000) / 1000;
    let token = make_token(&json!({ "exp": exp_secs }));
    assert_eq!(minutes_until_expiration(&token, NOW), 90);
}

#[test]
fn minutes_until_expiration_negative_once_expired() {
    let token = make_token(&json!({ "exp": (NOW - 30_000) / 1000 }));
    assert_eq!(minutes_until_expiration(&token, NOW), -1);
}

#[test]
fn minutes_until_expiration_zero_when_undecodable_or_missing_exp() {
    assert_eq!(minutes_until_expiration("garbage", NOW), 0);
    assert_eq!(minutes_until_expiration(&make_token(&json!({ "sub": "x" })), NOW), 0);
}

#[test]
fn is_token_expired_checks_exp() {
    assert!(!is_token_expired(&make_token(&json!({ "exp": NOW / 1000 + 60 })), NOW));
    assert!(is_token_expired(&make_token(&json!({ "exp": NOW / 1000 - 60 })), NOW));
    assert!(is_token_expired(&make_token(&json!({})), NOW));
    assert!(is_token_expired("garbage", NOW));
}

#[test]
fn should_warn_expiration_under_threshold() {
    let soon = make_token(&json!({ "exp": NOW / 1000 + 10 * 60 }));
    let later = make_token(&json!({ "exp": NOW / 1000 + 45 * 60 }));
    assert!(should_warn_expiration(&soon, NOW, 30));
    assert!(!should_warn_expiration(&later, NOW, 30));
    assert!(!should_warn_expiration("garbage", NOW, 30));
}

#[test]
fn mistyped_claim_does_not_hide_exp() {
    let token = make_token(&json!({ "exp": NOW / 1000 + 7200, "userId": "7", "admin": "yes", "authProvider": 3 }));
    assert_eq!(minutes_until_expiration(&token, NOW), 120);
    assert!(!is_token_expired(&token, NOW));
    assert!(!should_warn_expiration(&token, NOW, 30));

    let claims = Claims::decode(&token).unwrap();
    assert_eq!(claims.user_id, Some(7));
    assert_eq!(claims.admin, None);
    assert_eq!(claims.auth_provider, None);
}

#[test]
fn fractional_exp_is_floored() {
    let token = make_token(&json!({ "exp": (NOW / 1000 + 7200) as f64 + 0.5 }));
    assert_eq!(Claims::decode(&token).unwrap().exp, Some(NOW / 1000 + 7200));
    assert_eq!(minutes_until_expiration(&token, NOW), 120);
}

#[test]
fn non_numeric_exp_reads_as_absent() {
    let token = make_token(&json!({ "exp": "tomorrow", "sub": "ana@example.com" }));
    let claims = Claims::decode(&token).unwrap();
    assert_eq!(claims.exp, None);
    assert_eq!(claims.sub.as_deref(), Some("ana@example.com"));
    assert_eq!(minutes_until_expiration(&token, NOW), 0);
}

#[test]
fn extreme_exp_values_do_not_overflow() {
    let ancient = make_token(&json!({ "exp": i64::MIN / 1000 - 1 }));
    assert!(minutes_until_expiration(&ancient, NOW) < 0);
    assert!(is_token_expired(&ancient, NOW));
    assert!(!should_warn_expiration(&ancient, NOW, 30));

    let distant = make_token(&json!({ "exp": i64::MAX }));
    assert!(minutes_until_expiration(&distant, i64::MIN) > 0);
    assert!(!is_token_expired(&distant, NOW));
    assert!(should_warn_expiration(&distant, NOW, i64::MAX));
}
