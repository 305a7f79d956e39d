//! Integration tests for modem list-response extraction
use smsgate::sms::extract_messages;

const CLIMATOLOGY_BODY: &str = "AIN0:21.5,Normal;AIN1:60.2,Normal;DIN0:1;";

fn record(index: u32, state: &str, identity: &str, stamp: &str, body: &str) -> String {
    format!(
        "+CMGL: {},\"{}\",\"{}\",,\"{}\"\r\n{}\r\n",
        index, state, identity, stamp, body
    )
}

#[test]
fn empty_input_yields_no_messages() {
    assert!(extract_messages("", 1).is_empty());
    assert!(extract_messages("\r\nOK\r\n", 1).is_empty());
}

#[test]
fn extraction_preserves_header_order() {
    let mut raw = String::from("AT+CMGL=\"ALL\"\r\n");
    for i in 0..5 {
        raw.push_str(&record(
            i,
            "REC UNREAD",
            "+628115013798",
            &format!("25/04/29,0{}:00:00+28", i),
            CLIMATOLOGY_BODY,
        ));
    }
    raw.push_str("OK\r\n");

    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs.len(), 5);
    for (i, msg) in msgs.iter().enumerate() {
        assert_eq!(msg.timestamp, format!("2025-04-29 0{}:00:00", i + 1));
    }
}

#[test]
fn heartbeat_only_record_is_filtered() {
    let raw = format!(
        "{}{}OK\r\n",
        record(
            1,
            "REC READ",
            "+628115999999",
            "25/04/29,08:00:42+28",
            "STATUS:OK;BATT:87;SIGNAL:GOOD"
        ),
        record(
            2,
            "REC UNREAD",
            "+628115013798",
            "25/04/29,09:00:42+28",
            CLIMATOLOGY_BODY
        ),
    );

    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].identity, "+628115013798");
    assert_eq!(msgs[0].body, CLIMATOLOGY_BODY);
}

#[test]
fn both_read_states_are_accepted() {
    let raw = format!(
        "{}{}",
        record(1, "REC READ", "+62811", "25/04/29,08:00:42+28", CLIMATOLOGY_BODY),
        record(2, "REC UNREAD", "+62812", "25/04/29,08:05:42+28", CLIMATOLOGY_BODY),
    );
    assert_eq!(extract_messages(&raw, 1).len(), 2);
}

#[test]
fn multi_line_body_is_not_truncated() {
    let raw = "+CMGL: 3,\"REC UNREAD\",\"+62811\",,\"25/04/29,08:00:42+28\"\r\n\
               AIN0:21.5,Normal;\r\n\
               AIN1:60.2,Normal;\r\n\
               DIN0:1;\r\n\
               +CMGL: 4,\"REC UNREAD\",\"+62812\",,\"25/04/29,08:10:42+28\"\r\n\
               AIN0:3.3;\r\n";

    let msgs = extract_messages(raw, 1);
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].body, "AIN0:21.5,Normal;\nAIN1:60.2,Normal;\nDIN0:1;");
    assert_eq!(msgs[1].body, "AIN0:3.3;");
}

#[test]
fn malformed_trailing_record_is_excluded() {
    let mut raw = record(
        1,
        "REC UNREAD",
        "+62811",
        "25/04/29,08:00:42+28",
        CLIMATOLOGY_BODY,
    );
    // Truncated header, as when the serial read cuts off mid-response
    raw.push_str("+CMGL: 2,\"REC UNR");

    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].identity, "+62811");
}

#[test]
fn timestamps_are_normalized_with_configured_offset() {
    let raw = record(
        1,
        "REC UNREAD",
        "+62811",
        "25/12/31,23:30:00+28",
        CLIMATOLOGY_BODY,
    );
    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs[0].timestamp, "2026-01-01 00:30:00");

    let msgs = extract_messages(&raw, 0);
    assert_eq!(msgs[0].timestamp, "2025-12-31 23:30:00");
}

#[test]
fn unparseable_timestamp_passes_through() {
    let raw = record(1, "REC UNREAD", "+62811", "not-a-timestamp", CLIMATOLOGY_BODY);
    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].timestamp, "not-a-timestamp");
}

#[test]
fn chatter_between_records_is_ignored() {
    let raw = format!(
        "^BOOT:123,0,0,0,72\r\n{}^RSSI:21\r\nOK\r\n",
        record(7, "REC UNREAD", "+62811", "25/04/29,08:00:42+28", CLIMATOLOGY_BODY)
    );
    let msgs = extract_messages(&raw, 1);
    assert_eq!(msgs.len(), 1);
    // Post-record chatter attaches to the body scan but never fakes a marker
    assert!(msgs[0].body.contains("AIN0:21.5"));
}
