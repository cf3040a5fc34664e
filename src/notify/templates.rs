//! Email bodies
//!
//! Every interpolated value is HTML-escaped; client names and item
//! descriptions are user input.

use htmlescape::{encode_attribute, encode_minimal};

use crate::render::InvoiceDocument;

/// Subject and HTML body for a new-invoice email
pub fn invoice_email(document: &InvoiceDocument, payment_link: &str) -> (String, String) {
    let sender = &document.sender;
    let subject = format!(
        "Invoice from {} via {}",
        sender.name, document.brand_name
    );

    let items: String = document
        .lines
        .iter()
        .map(|line| {
            format!(
                "<li>{}: {}</li>",
                encode_minimal(&line.description),
                encode_minimal(&document.display_amount(line.amount))
            )
        })
        .collect();

    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h2 style="color: #004085;">Hello {client},</h2>
  <p>{sender} has sent you invoice <strong>{number}</strong> using {brand}. Please find the details below:</p>
  <ul>{items}</ul>
  <p><strong>Total Amount:</strong> {total}</p>
  <p><a href="{link}" style="background-color: #007bff; color: white; padding: 10px 15px; text-decoration: none; border-radius: 4px;">Pay Invoice</a></p>
  <p><em>Due by: {due}</em></p>
  <hr />
  <p>If you have any questions, please contact {sender} at <a href="mailto:{email_attr}">{email}</a> or reply to this email.</p>
  <p>Thank you for using {brand}!</p>
</div>"#,
        client = encode_minimal(&document.client_name),
        sender = encode_minimal(&sender.name),
        number = encode_minimal(&document.invoice_number),
        brand = encode_minimal(&document.brand_name),
        items = items,
        total = encode_minimal(&document.display_amount(document.total)),
        link = encode_attribute(payment_link),
        due = document.display_date(document.due_date),
        email_attr = encode_attribute(&sender.email),
        email = encode_minimal(&sender.email),
    );

    (subject, html)
}
