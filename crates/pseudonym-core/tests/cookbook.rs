//! Reference vectors from the eHealth pseudonymisation cookbook (P-521).
//!
//! Y coordinates are asserted up to root choice: the protocol does not care
//! which of the two square roots an implementation picks, so both the
//! documented Y and its negation are accepted.


use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pseudonym_core::{curve, Domain, Scalar};

fn domain(buffer_size: usize) -> Domain {
    Domain::builder("test")
        .buffer_size(buffer_size)
        .build()
        .unwrap()
}

fn scalar_one() -> Scalar {
    curve::scalar_from_be_bytes(&[1]).unwrap()
}

/// Standard Base64 of the 66-byte left-padded form, as `Point::x`/`y` emit.
fn to_long(short: &str) -> String {
    let decoded = STANDARD.decode(short).unwrap();
    let mut long = [0u8; 66];
    long[66 - decoded.len()..].copy_from_slice(&decoded);
    STANDARD.encode(long)
}

/// Accept the documented Y or its negation (the other square root).
fn assert_either_root(domain: &Domain, x: &str, expected_y: &str, actual_y: &str) {
    let negated = domain
        .pseudonyms()
        .from_xy(x, expected_y)
        .unwrap()
        .multiply(&-scalar_one())
        .unwrap()
        .y();
    assert!(
        actual_y == to_long(expected_y) || actual_y == negated,
        "Y is neither the expected root nor its negation for X {x}"
    );
}

const PACKING_VECTORS_BUFFER8: &[[&str; 3]] = &[
    ["MQ==", "MQEAAAAAAAAAAA==", "AIaELoSge8ZH9YhlIeahODkJDe23j1NUsQqwm32j1o+CdG6lIKhi1KqdONLRsXh+ciZjddZtm2dShPpp3K5aDxD8"],
    ["MTI=", "MTICAAAAAAAAAAA=", "AURV0WACmddkLIQK2IF76J0XGOygU+mSZ5gnbQFQ7WSyEUq9H/c0738e2pwVTiSxcI1xz1dGqTcYfotir3K0LQrz"],
    ["MTIz", "MTIzAwAAAAAAAAAC", "QRJBFXWQueauTw1qeNzTM+3qZtLLbykEN8LCmrn29Nv3IXHlLFa9Hhd/iuRBHDsgv4usav38XCWgxroQ8zWruQ4="],
    ["MTIzNA==", "MTIzNAQAAAAAAAAAAg==", "CEI1kmrzzVyfeDxtQS3Gyme8//vbrYDneMIEmTFtaX2GyLhlA2JGNu0Wjd+qbpKUfMTB/rM+/H3jeAgFkR+lvIQ="],
    ["MTI0NQ==", "MTI0NQQAAAAAAAAAAA==", "AULi2K88MtySUCftPD3k2HAtq2myTVkgT33sMxm4Np2RJSdBJjPiamRyS3vIbKEaf0aNRan6B1lp4xJAr/ZAsdit"],
    ["MTIzNDU2", "MTIzNDU2BgAAAAAAAAAA", "AdnB30YG45HqxJyenfTwyomOV5NSCs9AbKKQFRBpEzDwuJ4FMak5UpxYElx7yGAGYjBcbEqV8vdjEBoGSewjYJx4"],
    ["MTIzNDU2Nw==", "MTIzNDU2NwcAAAAAAAAAAA==", "D5OUrNIZPGXYb+soXNh8VMiPYWudaCNAEZX/4B1EftfRMQOxStZBr23pCdCpaxpyZNc0HicDeBo+/TflO9kF10c="],
    ["MTIzNDU2Nzg=", "MTIzNDU2NzgIAAAAAAAAAAE=", "AfSlL6dUUnkvIowaMspc6avl4TvCqC4WE/NmEb1q3edqhmjBi8d3ku4GahorYpTkKDDGf1mV36ynC/o2/Zh8PqC7"],
    ["MTIzNDU2Nzg5", "MTIzNDU2Nzg5CQAAAAAAAAAB", "AWxzHDVoA6b08d7mpWsCn/AatpfglyUpsa4soLUzaS+HfRiwFT3EfvEd/1/CLVnVS0U/CUqT9tGNlhry0eWiyDMJ"],
    ["MTIzNDU2Nzg5MA==", "MTIzNDU2Nzg5MAoAAAAAAAAAAA==", "ALoZzeaX7m5Yz1YEUKfbyNYSOblCaUyK+CagReh+9BArAcI+d77cdV3iZQ52hI06Xfbd67J7jXbTKuVoRsDbCIdY"],
    ["RzDziSOxzz1fT6lMEPYT8C5xenPFTFwOhZe4CACeLbc=", "RzDziSOxzz1fT6lMEPYT8C5xenPFTFwOhZe4CACeLbcgAAAAAAAAAAA=", "ALARpzdxggw1mTjxYZKwdGOP0oyYKYjmqye1MewE9SP1zCp5wtSOpedAZNeyN1THUV0+WoXLUDCB1NZWT25xz5N6"],
    ["cmFuZG9tdGV4dA==", "cmFuZG9tdGV4dAoAAAAAAAAABA==", "AJXsoDpTMzMepP5g7Q0/aY11CrEp1cfgrw5+0S2XO5nNxzOu2jtpkgV9GOutVporRsKnLBs0VSglcRs+qINRK/4D"],
];

#[test]
fn value_packing_matches_reference_vectors() {
    let domain8 = domain(8);
    for [input, expected_x, expected_y] in PACKING_VECTORS_BUFFER8 {
        let bytes = STANDARD.decode(input).unwrap();
        let value = domain8.values().from_bytes(&bytes).unwrap();
        assert_eq!(value.x(), to_long(expected_x), "X for input {input}");
        assert_either_root(&domain8, expected_x, expected_y, &value.y());
        // Exact inverse of the packing.
        assert_eq!(value.as_bytes().unwrap(), bytes);
    }

    let domain10 = domain(10);
    let value = domain10
        .values()
        .from_bytes(&STANDARD.decode("MTIzNDU2Nzg5MA==").unwrap())
        .unwrap();
    assert_eq!(value.x(), to_long("MTIzNDU2Nzg5MAoAAAAAAAAAAAAC"));

    let domain12 = domain(12);
    let value = domain12
        .values()
        .from_bytes(&STANDARD.decode("MTIzNDU2Nzg5MA==").unwrap())
        .unwrap();
    assert_eq!(value.x(), to_long("MTIzNDU2Nzg5MAoAAAAAAAAAAAAAAAE="));
}

#[test]
fn compute_y_matches_reference_vectors() {
    let domain8 = domain(8);
    for [_, x, y] in PACKING_VECTORS_BUFFER8 {
        let pseudonym = domain8.pseudonyms().from_x(x).unwrap();
        assert_eq!(pseudonym.x(), to_long(x));
        assert_either_root(&domain8, x, y, &pseudonym.y());
    }
}

/// Deterministic blinding: point · scalar with all operands pinned.
#[test]
fn blinding_matches_reference_vectors() {
    let vectors: &[[&str; 5]] = &[
        [
            "MQEAAAAAAAAAAA==",
            "AIaELoSge8ZH9YhlIeahODkJDe23j1NUsQqwm32j1o+CdG6lIKhi1KqdONLRsXh+ciZjddZtm2dShPpp3K5aDxD8",
            "AZ2TzlDmMWQW/kgJng4nThRUW149uzE+SNBUp4T0/0kRO2/zg2os/8dOEzZrvQPGgv5l0Gk68qczZjt8yfO8FRcF",
            "AV+VXF9H5LdTe4b1SSC7bHjp6b2enJmfplC6a3/jCR5fUHxXRSaRniYR8h7ugNqalGvP49cZnv6lf9B72RUG0rA/",
            "eSmII52CEtsZzSseUDY3YKLtSgqhq1wLPm9ncHBzGiv1wMIxmc1jSmpW36GhTt/s1P5shZGhG8ncoWKSGkJDyfw=",
        ],
        [
            "MTICAAAAAAAAAAA=",
            "AURV0WACmddkLIQK2IF76J0XGOygU+mSZ5gnbQFQ7WSyEUq9H/c0738e2pwVTiSxcI1xz1dGqTcYfotir3K0LQrz",
            "AZ2TzlDmMWQW/kgJng4nThRUW149uzE+SNBUp4T0/0kRO2/zg2os/8dOEzZrvQPGgv5l0Gk68qczZjt8yfO8FRcF",
            "ANuVBi6VwQfa2F8Y+OM4NOQ3EtEOaLhWA92tYheMdK5DN9iubeC2pyy7gWEQKHkr5wx9VLv5ahX+3cqXdi+KvSn1",
            "ASbUF7UOw7WtsUKPk7yVCL9gPZSoP9DD2Mm0cxSUJd1qrO5A+mbQfQhKnQdkXp00T0U5kHNIhVKRNQtN7tIqW1FK",
        ],
        [
            "MTIzNDU2Nzg5MAoAAAAAAAAAAA==",
            "ALoZzeaX7m5Yz1YEUKfbyNYSOblCaUyK+CagReh+9BArAcI+d77cdV3iZQ52hI06Xfbd67J7jXbTKuVoRsDbCIdY",
            "AZ2TzlDmMWQW/kgJng4nThRUW149uzE+SNBUp4T0/0kRO2/zg2os/8dOEzZrvQPGgv5l0Gk68qczZjt8yfO8FRcF",
            "ATXxK6NZFjvkwVVdDaZhxdloOo5FhvuZFse61cipoEk84ZLOk1w0qBqUsVWOm/upGAwMD8l1FmvuZ1gH+2u7ECd/",
            "AKGmtoy//h6dsi2nvNfywPA4g0G+vP94xkg+XU2Cd5vROjCbu109N/EtAf+3x+jcaUH00s6gO+ENinJ/I+hnJXs9",
        ],
        [
            "cmFuZG9tdGV4dAoAAAAAAAAABA==",
            "AJXsoDpTMzMepP5g7Q0/aY11CrEp1cfgrw5+0S2XO5nNxzOu2jtpkgV9GOutVporRsKnLBs0VSglcRs+qINRK/4D",
            "AZ2TzlDmMWQW/kgJng4nThRUW149uzE+SNBUp4T0/0kRO2/zg2os/8dOEzZrvQPGgv5l0Gk68qczZjt8yfO8FRcF",
            "P/au8R8yR8aYFNOfY5EPu4DVlqXC+6Oh/Z5d6T/S4huWQgxsadxbcFRniWvnsjAsvitvRODmM8NK+nh1QwW1vIU=",
            "AeHg+C0RKMlsWzZem0sYd8+2+/i0XYHDCNiXTFz5fo6eHzOYFwUe3LLcPizLq/OhHWlJ5/zRlk5stjXpAiD/qpqT",
        ],
    ];

    let domain8 = domain(8);
    for [x, y, scalar_b64, blinded_x, blinded_y] in vectors {
        let scalar_bytes = STANDARD.decode(scalar_b64).unwrap();
        let scalar = curve::scalar_from_be_bytes(&scalar_bytes).unwrap();

        let pseudonym = domain8.pseudonyms().from_xy(x, y).unwrap();
        let blinded = pseudonym.multiply(&scalar).unwrap();
        assert_eq!(blinded.x(), to_long(blinded_x));
        assert_eq!(blinded.y(), to_long(blinded_y));
    }
}

mod sec1 {
    use super::*;

    const X: &str =
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAMDEyMzQ1Njc4OTEwDAAAAAAAAAAB";
    const X_SHORT: &str = "MDEyMzQ1Njc4OTEwDAAAAAAAAAAB";
    const Y: &str =
        "ABxCeSYmGgumIwOuFyKmK1l8bilTjL+NKElpegi8mcsn3QB6grG5PHpgD8XCTPTGhDrT6HsGuEkEOVwZ23maSliV";
    const SEC1_COMPRESSED: &str =
        "AwAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAADAxMjM0NTY3ODkxMAwAAAAAAAAAAQ";
    const SEC1: &str =
        "BAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAADAxMjM0NTY3ODkxMAwAAAAAAAAAAQAcQnkmJhoLpiMDrhcipitZfG4pU4y_jShJaXoIvJnLJ90AeoKxuTx6YA_Fwkz0xoQ60-h7BrhJBDlcGdt5mkpYlQ";

    #[test]
    fn from_xy_as_short_string() {
        let pseudonym = domain(8).pseudonyms().from_xy(X, Y).unwrap();
        assert_eq!(pseudonym.as_short_string(), SEC1_COMPRESSED);
    }

    #[test]
    fn from_xy_as_string() {
        let pseudonym = domain(8).pseudonyms().from_xy(X, Y).unwrap();
        assert_eq!(pseudonym.as_string(), SEC1);
    }

    #[test]
    fn from_x_accepts_short_form() {
        let domain = domain(8);
        let long = domain.pseudonyms().from_x(X).unwrap();
        let short = domain.pseudonyms().from_x(X_SHORT).unwrap();
        assert_eq!(long.x(), short.x());
        assert_eq!(long.y(), short.y());
    }

    #[test]
    fn sec1_roundtrips_both_forms() {
        let domain = domain(8);
        let pseudonym = domain.pseudonyms().from_xy(X, Y).unwrap();

        let via_uncompressed = domain.pseudonyms().from_sec1(&pseudonym.as_string()).unwrap();
        assert_eq!(via_uncompressed, pseudonym);
        assert_eq!(via_uncompressed.y(), pseudonym.y());

        let via_compressed = domain
            .pseudonyms()
            .from_sec1(&pseudonym.as_short_string())
            .unwrap();
        assert_eq!(via_compressed, pseudonym);
        assert_eq!(via_compressed.y(), pseudonym.y());
    }
}

mod off_curve {
    use super::*;

    #[test]
    fn from_xy_does_not_validate_curve_membership() {
        // Base64 of BigInteger 1 and 2 — not a curve point.
        let pseudonym = domain(8).pseudonyms().from_xy("AQ==", "Ag==").unwrap();
        assert_eq!(pseudonym.x(), to_long("AQ=="));
        assert_eq!(pseudonym.y(), to_long("Ag=="));
    }

    #[test]
    fn arithmetic_on_off_curve_points_fails() {
        let pseudonym = domain(8).pseudonyms().from_xy("AQ==", "Ag==").unwrap();
        assert!(pseudonym.multiply(&scalar_one()).is_err());
    }
}

mod in_transit_strings {
    use super::*;

    const SEC1_COMPRESSED: &str =
        "AgBCRmd68AVWDtBMWajDd2W63E_j7X0WmQdMnz9m3wFkoxH-muD692vlltWjKGCRxnftuT9nAGkmDRomoHZQc8G3hQ";
    const TRANSIT_INFO: &str =
        "eyJhbGciOiJkaXIiLCJlbmMiOiJBMjU2R0NNIiwia2lkIjoiMjAyMi0xMiIsImF1ZCI6Imh0dHBzOi8vYXBpLWludC5laGVhbHRoLmZnb3YuYmUvcHNldWRvL3YxL2RvbWFpbnMvdWhtZXBfdjEifQ..osrl3KS4nkheJvcJ.pXN4Asfg8RGtsoV529YoFRWP_XSXUViR-wxuvwYTvN9fMSDksq7qZMmmqDstyGyOidHKHrVvtqB0PFrek71P4K8Rp0rDuvAc6RC2cbdwV08Ksw6t3Wf72H8c8QDKGKmYb84z_oH8TMnY26cAm0nC2Hb18H-SXTh8xFXe3DK8y06wx4rAAXFZGsXayloJ6oweux_tvKQ4NSWi3gzhjVi0g-qWR9TYZNj9NNyU9eeSDk9UsXJ8cugpvStu6oFOCbW4520fl6h5oaJ7Rye3.IEd7uLw-ICHAwqIzfrjOFw";

    #[test]
    fn as_short_string_roundtrips() {
        let input = format!("{SEC1_COMPRESSED}:{TRANSIT_INFO}");
        let in_transit = domain(8)
            .pseudonyms_in_transit()
            .from_sec1_and_transit_info(&input)
            .unwrap();
        assert_eq!(in_transit.as_short_string(), input);
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(domain(8)
            .pseudonyms_in_transit()
            .from_sec1_and_transit_info(SEC1_COMPRESSED)
            .is_err());
    }

    /// The real eHealth header from the acceptance environment parses with
    /// all six fields intact.
    #[test]
    fn parses_real_transit_info_header() {
        let raw = "eyJhdWQiOiJodHRwczovL2FwaS1hY3B0LmVoZWFsdGguZmdvdi5iZS9wc2V1ZG8vdjEvZG9tYWlucy9laGVhbHRoX3YxIiwiZW5jIjoiQTI1NkdDTSIsImV4cCI6MTcxODIwMzI4OCwiaWF0IjoxNzE4MjAyNjg4LCJhbGciOiJkaXIiLCJraWQiOiJiNTRjZTNlNC1lN2M1LTQ1NWYtODA4ZS02OWEwM2EzN2E4NWYifQ..zO-S0LyrwtQLb-x9.oB87loxuJfNmQbif4hHLh2Mvot17jxeqpBfsjayqyXVKMXB8-QMZYBY1OgwmWU7ZJKvbBU62f0I6FRZIoKMQjlPMoNNJmnc2FkaIpyi6TLAciZgdolJZwZgIN5_gdKdURIJBFOH_MEyZCCAcK6TuYRM98aGPV2SMU06RUnqrWZa1eie93w4u.SNkaDxhvpQaQL0aBumRLmQ";

        let in_transit = domain(8)
            .pseudonyms_in_transit()
            .from_xy_and_transit_info("AQ==", "Ag==", raw)
            .unwrap();
        let header = in_transit.transit_info().header().unwrap();

        assert_eq!(header.len(), 6);
        assert_eq!(
            header["aud"],
            "https://api-acpt.ehealth.fgov.be/pseudo/v1/domains/ehealth_v1"
        );
        assert_eq!(header["enc"], "A256GCM");
        assert_eq!(header["exp"], 1718203288i64);
        assert_eq!(header["iat"], 1718202688i64);
        assert_eq!(header["alg"], "dir");
        assert_eq!(header["kid"], "b54ce3e4-e7c5-455f-808e-69a03a37a85f");
    }
}
