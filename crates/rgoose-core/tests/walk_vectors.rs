//! Frame vector tests (R-GOOSE, CLTP-wrapped R-GOOSE, layer 2 GOOSE).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use rgoose_core::protocol::{sniff, BerGooseDecoder, WalkOptions};

use vector_loader::load;

fn strs(v: &serde_json::Value) -> Vec<String> {
    v.as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn walk_vectors() {
    let files = [
        "rgoose_empty_payload.json",
        "rgoose_goose_padding_mac.json",
        "rgoose_sv_payload.json",
        "rgoose_zero_pdu.json",
        "rgoose_truncated.json",
        "rgoose_sv_spdu.json",
        "goose_l2_short_time.json",
        "cltp_wrapped.json",
    ];

    let decoder = BerGooseDecoder::default();
    let opts = WalkOptions::default();

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = sniff::dissect(v.framing, &raw, &decoder, &opts);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let d = res.expect("expected dissection");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(d.cursor as u64, ex["cursor"].as_u64().unwrap(), "vector={}", v.description);
        assert!(d.cursor <= raw.len(), "vector={}", v.description);
        assert_eq!(d.apdus.len() as u64, ex["apdus"].as_u64().unwrap(), "vector={}", v.description);

        let markers: Vec<String> = d.markers.iter().map(|m| m.kind.code().to_string()).collect();
        assert_eq!(markers, strs(&ex["markers"]), "vector={}", v.description);

        for abbrev in strs(&ex["present"]) {
            assert!(
                d.records.iter().any(|r| r.field.abbrev() == abbrev),
                "vector={} missing {abbrev}",
                v.description
            );
        }
        for abbrev in strs(&ex["absent"]) {
            assert!(
                d.records.iter().all(|r| r.field.abbrev() != abbrev),
                "vector={} unexpected {abbrev}",
                v.description
            );
        }

        if let Some(off) = ex.get("hmac_offset").and_then(|o| o.as_u64()) {
            let mac = d.records.iter().find(|r| r.field.abbrev() == "rgoose.hmac").unwrap();
            assert_eq!(mac.offset as u64, off, "vector={}", v.description);
            assert_eq!(mac.len as u64, ex["hmac_len"].as_u64().unwrap(), "vector={}", v.description);
        }

        for r in &d.records {
            assert!(r.offset + r.len <= raw.len(), "vector={} record {:?} out of bounds", v.description, r.field);
        }
    }
}
