use super::sendmail::{MailError, Mailer};

const VERIFICATION_TEMPLATE: &str = include_str!("templates/verification-code.html");
const RESET_PASSWORD_TEMPLATE: &str = include_str!("templates/reset-password.html");

pub async fn send_verification_email(
    mailer: &Mailer,
    to_email: &str,
    verification_code: &str,
) -> Result<(), MailError> {
    let subject = "Verify your email";
    let placeholders = [("verification_code", verification_code.to_string())];

    mailer
        .send_html(to_email, subject, VERIFICATION_TEMPLATE, &placeholders)
        .await
}

pub async fn send_forgot_password_email(
    mailer: &Mailer,
    to_email: &str,
    reset_link: &str,
) -> Result<(), MailError> {
    let subject = "Password Reset Request";
    let placeholders = [("reset_link", reset_link.to_string())];

    mailer
        .send_html(to_email, subject, RESET_PASSWORD_TEMPLATE, &placeholders)
        .await
}

/// Link the frontend serves the reset form on.
pub fn reset_link(client_url: &str, token: &str) -> String {
    format!("{}/reset-password/{}", client_url.trim_end_matches('/'), token)
}
