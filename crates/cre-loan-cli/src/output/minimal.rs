use serde_json::Value;

/// Headline figure of each command, searched in order. Dotted keys reach
/// into nested sections; investment returns come before the loan figures
/// that the projection also reports.
const PRIORITY_KEYS: [&str; 7] = [
    "returns.irr",
    "returns.equity_multiple",
    "maximum_loan_amount",
    "payment",
    "io_payment",
    "present_value",
    "balloon_payment",
];

/// Print just the headline value from the output.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(val) = headline(result) {
        println!("{}", format_minimal(val));
        return;
    }

    if let Some((key, val)) = result.as_object().and_then(|m| m.iter().next()) {
        println!("{}: {}", key, format_minimal(val));
        return;
    }

    println!("{}", format_minimal(result));
}

fn headline(result: &Value) -> Option<&Value> {
    PRIORITY_KEYS
        .iter()
        .find_map(|key| lookup(result, key).filter(|v| !v.is_null()))
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_reaches_nested_sections() {
        let v = json!({ "returns": { "irr": "0.2692" } });
        assert_eq!(lookup(&v, "returns.irr"), Some(&json!("0.2692")));
        assert_eq!(lookup(&v, "returns.missing"), None);
        assert_eq!(lookup(&v, "payment"), None);
    }

    #[test]
    fn test_investment_headline_is_irr() {
        let projection = json!({
            "maximum_loan_amount": "700000",
            "origination_fee": "7000.00",
            "returns": { "irr": "0.2692", "equity_multiple": "2.9036" }
        });
        assert_eq!(headline(&projection), Some(&json!("0.2692")));
    }

    #[test]
    fn test_unresolved_irr_falls_back_to_equity_multiple() {
        let projection = json!({
            "maximum_loan_amount": "700000",
            "returns": { "irr": null, "equity_multiple": "0.8123" }
        });
        assert_eq!(headline(&projection), Some(&json!("0.8123")));
    }

    #[test]
    fn test_sizing_headline_is_loan_amount() {
        let sizing = json!({
            "constraints": { "binding": "ltv" },
            "maximum_loan_amount": "700",
            "io_payment": "-3.15",
            "balloon_payment": "544.95"
        });
        assert_eq!(headline(&sizing), Some(&json!("700")));
    }
}
