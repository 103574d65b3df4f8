//! The reference scenarios, run against the in-process server.

mod common;

use recordlink_client::proto::error_codes;
use recordlink_client::{
    DocumentKind, Error, Misuse, Mode, RecordKey, RecordType, Value,
};

#[test]
fn test_add_partner() {
    let server = common::demo_server();
    let session = common::connected(&server);

    let mut partner = session.create(RecordType::BusinessPartner).unwrap();
    partner
        .set_field("CardCode", "ZZZ001")
        .set_field("CardName", "ZZZ Test Business Partner")
        .set_field("CardType", 0)
        .set_field("CompanyPrivate", 0);
    let key = partner.submit().unwrap();

    assert_eq!(key, RecordKey::from("ZZZ001"));
    assert_eq!(partner.key(), Some(&key));

    let stored = session.load(RecordType::BusinessPartner, "ZZZ001").unwrap();
    assert_eq!(
        stored.field("CardName"),
        Some(&Value::from("ZZZ Test Business Partner"))
    );
}

#[test]
fn test_duplicate_partner_is_rejected() {
    let server = common::demo_server();
    let session = common::connected(&server);

    for attempt in 0..2 {
        let mut partner = session.create(RecordType::BusinessPartner).unwrap();
        partner
            .set_field("CardCode", "ZZZ001")
            .set_field("CardName", "ZZZ Test Business Partner");
        let result = partner.submit();

        if attempt == 0 {
            assert!(result.is_ok());
            continue;
        }
        match result {
            Err(Error::ServerRejection { code, message }) => {
                assert_ne!(code, 0);
                assert_eq!(code, error_codes::DUPLICATE_KEY);
                assert!(message.contains("ZZZ001"), "{message}");
            }
            other => panic!("expected a duplicate-key rejection, got {:?}", other),
        }
    }
}

#[test]
fn test_empty_query() {
    let server = common::empty_server();
    let session = common::connected(&server);

    let mut cursor = session
        .query("SELECT CardCode, CardName FROM OCRD ORDER BY CardCode")
        .unwrap();
    assert_eq!(cursor.row_count(), 0);
    assert_eq!(cursor.field_count(), 2);
    assert_eq!(cursor.field_name(0).unwrap(), "CardCode");

    cursor.move_first().unwrap();
    assert!(cursor.is_at_end());
    assert!(matches!(
        cursor.field_value(0),
        Err(Error::Misuse(Misuse::NoCurrentRow))
    ));
    cursor.release().unwrap();
}

#[test]
fn test_unlock_user() {
    let server = common::demo_server();
    let session = common::connected(&server);

    let mut user = session.load(RecordType::User, 40).unwrap();
    assert_eq!(user.mode(), &Mode::Loaded { key: RecordKey::Entry(40) });
    assert_eq!(user.field("Locked").and_then(Value::as_i64), Some(1));

    user.set_field("Locked", 0);
    assert_eq!(user.submit().unwrap(), RecordKey::Entry(40));

    let reloaded = session.load(RecordType::User, 40).unwrap();
    assert_eq!(reloaded.field("Locked").and_then(Value::as_i64), Some(0));
    assert_eq!(reloaded.field("UserCode"), Some(&Value::from("jsmith")));
}

#[test]
fn test_add_document_with_lines() {
    let server = common::demo_server();
    let session = common::connected(&server);
    let order_type = RecordType::Document(DocumentKind::SalesOrder);

    let mut order = session.create(order_type).unwrap();
    order.set_field("CardCode", "C20000");
    for (item, quantity) in [("ITEM001", 1.0), ("ITEM002", 5.0)] {
        let line = order.append_line().unwrap();
        order.set_line_field(line, "ItemCode", item).unwrap();
        order.set_line_field(line, "Quantity", quantity).unwrap();
    }
    let key = order.submit().unwrap();
    let entry = key.as_entry().expect("documents are keyed by entry");
    assert!(entry > 0);

    let stored = session.load(order_type, entry).unwrap();
    assert_eq!(stored.line_count(), 2);
    assert_eq!(
        stored.line_field(0, "ItemCode").unwrap(),
        Some(&Value::from("ITEM001"))
    );
    assert_eq!(
        stored.line_field(1, "Quantity").unwrap().and_then(Value::as_f64),
        Some(5.0)
    );
    assert_eq!(stored.field("CardName"), Some(&Value::from("Norm Thompson")));
}
