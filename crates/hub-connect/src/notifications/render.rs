use serde_json::Value;

use super::domain::{EventKind, Notification, Template};

/// Outgoing text for `notification`: the tenant's active template when one
/// exists, otherwise the built-in format for its kind.
pub fn render_message(notification: &Notification, template: Option<&Template>) -> String {
    match template {
        Some(template) => fill_placeholders(&template.content, notification),
        None => default_message(notification),
    }
}

/// Replace `{field}` placeholders; unknown names are left as written.
pub fn fill_placeholders(content: &str, notification: &Notification) -> String {
    let mut rendered = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some(end) = candidate.find('}') else {
            rendered.push_str(candidate);
            return rendered;
        };
        let name = &candidate[1..end];
        match placeholder_value(name, notification) {
            Some(value) => rendered.push_str(&value),
            None => rendered.push_str(&candidate[..=end]),
        }
        rest = &candidate[end + 1..];
    }

    rendered.push_str(rest);
    rendered
}

fn placeholder_value(name: &str, notification: &Notification) -> Option<String> {
    let value = match name {
        "client_name" => notification.client_name.clone().unwrap_or_default(),
        "client_phone" => notification.client_phone.clone().unwrap_or_default(),
        "value" => notification.value.map(format_amount).unwrap_or_default(),
        "nf_number" => notification.nf_number.clone().unwrap_or_default(),
        "type" => notification.kind.label().to_string(),
        "products" => notification
            .products
            .as_ref()
            .map(describe_products)
            .unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

fn default_message(notification: &Notification) -> String {
    let name = notification
        .client_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("cliente");

    let mut lines = vec![match &notification.kind {
        EventKind::Sale => format!("Olá {name}! Sua compra foi confirmada."),
        EventKind::Quote => format!("Olá {name}! Seu orçamento está pronto."),
        EventKind::Payment => format!("Olá {name}! Recebemos o seu pagamento."),
        EventKind::Other(kind) => format!("Olá {name}! Nova atualização: {kind}."),
    }];

    if let Some(value) = notification.value {
        lines.push(format!("Valor: {}", format_brl(value)));
    }
    if let Some(nf_number) = notification.nf_number.as_deref() {
        lines.push(format!("Documento: {nf_number}"));
    }
    if let Some(products) = notification.products.as_ref().map(describe_products) {
        if !products.is_empty() {
            lines.push(format!("Itens: {products}"));
        }
    }
    lines.push("Obrigado pela preferência!".to_string());

    lines.join("\n")
}

/// `1234.5` renders as `R$ 1.234,50`.
pub fn format_brl(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}R$ {}", format_amount(amount.abs()))
}

fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{:02}", cents % 100)
}

/// Line items as `name x qty` joined by commas; other shapes are shown as JSON.
fn describe_products(products: &Value) -> String {
    let Value::Array(items) = products else {
        return products.to_string();
    };

    items
        .iter()
        .map(|item| {
            let name = item
                .get("name")
                .or_else(|| item.get("nome"))
                .and_then(Value::as_str);
            let quantity = item
                .get("qty")
                .or_else(|| item.get("quantity"))
                .or_else(|| item.get("quantidade"));
            match (name, quantity) {
                (Some(name), Some(quantity)) => format!("{name} x{quantity}"),
                (Some(name), None) => name.to_string(),
                _ => match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                },
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip formatting characters and qualify bare numbers with `suffix`.
/// An empty address stays empty so the gateway can reject it.
pub fn normalize_destination(raw: &str, suffix: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '+' | '(' | ')' | '-') && !ch.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned.contains('@') {
        cleaned
    } else {
        format!("{cleaned}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::domain::{NotificationDraft, TenantId};
    use serde_json::json;

    fn sale() -> Notification {
        Notification::pending(
            TenantId("t-1".to_string()),
            EventKind::Sale,
            NotificationDraft {
                client_name: Some("Acme".to_string()),
                client_phone: Some("5511912345678".to_string()),
                value: Some(1234.5),
                nf_number: Some("NF-1".to_string()),
                products: None,
            },
        )
    }

    #[test]
    fn brl_amounts_use_dot_grouping_and_comma_decimals() {
        assert_eq!(format_brl(150.0), "R$ 150,00");
        assert_eq!(format_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_brl(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(format_brl(0.5), "R$ 0,50");
        assert_eq!(format_brl(-10.0), "-R$ 10,00");
    }

    #[test]
    fn default_sale_message_mentions_amount_and_document() {
        let text = render_message(&sale(), None);
        assert!(text.starts_with("Olá Acme! Sua compra foi confirmada."));
        assert!(text.contains("Valor: R$ 1.234,50"));
        assert!(text.contains("Documento: NF-1"));
    }

    #[test]
    fn default_message_without_optional_fields() {
        let notification = Notification::pending(
            TenantId("t-1".to_string()),
            EventKind::Other("refund".to_string()),
            NotificationDraft::default(),
        );
        let text = render_message(&notification, None);
        assert_eq!(
            text,
            "Olá cliente! Nova atualização: refund.\nObrigado pela preferência!"
        );
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let notification = sale();
        let template = Template::new(
            notification.tenant_id.clone(),
            "venda",
            EventKind::Sale,
            "{client_name}, pedido {nf_number} ({type}) de R$ {value}. {unknown} {",
        );
        assert_eq!(
            render_message(&notification, Some(&template)),
            "Acme, pedido NF-1 (sale) de R$ 1.234,50. {unknown} {"
        );
    }

    #[test]
    fn products_are_summarized() {
        let mut notification = sale();
        notification.products = Some(json!([
            { "name": "Parafuso", "qty": 10 },
            { "nome": "Porca" },
            "Arruela"
        ]));
        assert_eq!(
            fill_placeholders("{products}", &notification),
            "Parafuso x10, Porca, Arruela"
        );
    }

    #[test]
    fn destination_is_cleaned_and_qualified() {
        let suffix = "@s.whatsapp.net";
        assert_eq!(
            normalize_destination("+55 (11) 91234-5678", suffix),
            "5511912345678@s.whatsapp.net"
        );
        assert_eq!(
            normalize_destination("5511912345678@c.us", suffix),
            "5511912345678@c.us"
        );
        assert_eq!(normalize_destination("  ", suffix), "");
    }
}
