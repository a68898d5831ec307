//! Email address validation.

/// The pieces of a parsed mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailComponents {
    pub display_name: String,
    pub local_part: String,
    pub domain: String,
}

impl EmailComponents {
    /// The bare `local@domain` address without any display name.
    pub fn address(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }
}

/// Capability port for address validation. The default implementation
/// parses RFC 5322 mailbox shapes; hosts may substitute their own rules.
pub trait EmailValidator: Send + Sync {
    /// Parse an address into components, or `None` when it is not a valid
    /// mailbox.
    fn components(&self, input: &str) -> Option<EmailComponents>;

    fn is_valid(&self, input: &str) -> bool {
        self.components(input).is_some()
    }
}

/// Validator accepting `local@domain`, `<local@domain>`, and
/// `Display Name <local@domain>` mailbox forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailboxValidator;

impl EmailValidator for MailboxValidator {
    fn components(&self, input: &str) -> Option<EmailComponents> {
        let input = input.trim();

        let (display_name, address) = match input.find('<') {
            Some(open) => {
                let close = input.rfind('>')?;
                if close < open {
                    return None;
                }

                let display = input[..open].trim().trim_matches('"').to_string();
                (display, input[open + 1..close].trim())
            }
            None => (String::new(), input),
        };

        if address.is_empty() || address.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return None;
        }

        let (local_part, domain) = address.rsplit_once('@')?;
        if local_part.is_empty() || domain.is_empty() || local_part.contains('@') {
            return None;
        }

        if domain.starts_with('.') || domain.ends_with('.') {
            return None;
        }

        Some(EmailComponents {
            display_name,
            local_part: local_part.to_string(),
            domain: domain.to_string(),
        })
    }
}
