use rand::Rng;
use serde::{Deserialize, Serialize};

/// Identity record for one account to create. Immutable unit of work.
///
/// Two accounts are the same piece of work when their lowercased emails
/// match; see [`Account::dedup_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub username: String,
    pub password: String,
    /// MM/DD/YYYY
    pub birthdate: String,
}

impl Account {
    /// Deduplication key: the lowercased email address.
    pub fn dedup_key(&self) -> String {
        self.email.to_lowercase()
    }
}

const FIRST_NAMES: [&str; 24] = [
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Lisa", "Matthew", "Nancy",
];

const LAST_NAMES: [&str; 24] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White",
];

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%";
const PASSWORD_SYMBOLS: &[u8] = b"!@#$%";

const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Generate a random password with at least one lowercase, uppercase,
/// digit, and symbol character.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    loop {
        let password: String = (0..length)
            .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
            .collect();
        let has_lower = password.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = password.bytes().any(|b| b.is_ascii_uppercase());
        let has_digit = password.bytes().any(|b| b.is_ascii_digit());
        let has_symbol = password.bytes().any(|b| PASSWORD_SYMBOLS.contains(&b));
        if has_lower && has_upper && has_digit && has_symbol {
            return password;
        }
    }
}

/// Generate a valid MM/DD/2000 birthdate.
pub fn generate_birthdate() -> String {
    let mut rng = rand::rng();
    let month = rng.random_range(1..=12u32);
    let day = rng.random_range(1..=DAYS_IN_MONTH[(month - 1) as usize]);
    format!("{month:02}/{day:02}/2000")
}

/// Generate one account against a catchall email domain.
pub fn generate_account(catchall_domain: &str) -> Account {
    let mut rng = rand::rng();
    let first = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
    let base_name = format!("{}{}{}", first, last, rng.random_range(1000..=9999));
    Account {
        email: format!("{}@{}", base_name, catchall_domain),
        username: base_name.to_lowercase(),
        password: generate_password(16),
        birthdate: generate_birthdate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_lowercases_email() {
        let account = Account {
            email: "User@Example.COM".to_string(),
            username: "user1234".to_string(),
            password: "Xx1!aaaa".to_string(),
            birthdate: "01/25/1998".to_string(),
        };
        assert_eq!(account.dedup_key(), "user@example.com");
    }

    #[test]
    fn generated_password_covers_character_classes() {
        for _ in 0..20 {
            let password = generate_password(16);
            assert_eq!(password.len(), 16);
            assert!(password.bytes().any(|b| b.is_ascii_lowercase()));
            assert!(password.bytes().any(|b| b.is_ascii_uppercase()));
            assert!(password.bytes().any(|b| b.is_ascii_digit()));
            assert!(password.bytes().any(|b| PASSWORD_SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn generated_birthdate_is_well_formed() {
        for _ in 0..50 {
            let birthdate = generate_birthdate();
            let parts: Vec<&str> = birthdate.split('/').collect();
            assert_eq!(parts.len(), 3);
            let month: u32 = parts[0].parse().unwrap();
            let day: u32 = parts[1].parse().unwrap();
            assert!((1..=12).contains(&month));
            assert!((1..=DAYS_IN_MONTH[(month - 1) as usize]).contains(&day));
            assert_eq!(parts[2], "2000");
        }
    }

    #[test]
    fn generated_account_email_matches_domain() {
        let account = generate_account("example.com");
        assert!(account.email.ends_with("@example.com"));
        assert_eq!(
            account.username,
            account.email.split('@').next().unwrap().to_lowercase()
        );
    }
}
