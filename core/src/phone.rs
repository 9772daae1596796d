// orderpay/src/phone.rs

//! Phone number normalisation for mobile-money gateways.
//!
//! Every accepted spelling of a subscriber number maps to one canonical string,
//! `+<country code><subscriber digits>`.

use thiserror::Error;

pub const DEFAULT_COUNTRY_CODE: &str = "254";

/// Subscriber numbers (without country code or trunk prefix) are 9 digits.
const SUBSCRIBER_DIGITS: usize = 9;
const MAX_E164_DIGITS: usize = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
  #[error("phone number is empty")]
  Empty,
  #[error("phone number may only contain digits, a leading '+', spaces, dashes, dots or parentheses")]
  InvalidCharacters,
  #[error("phone number has too few digits")]
  TooShort,
  #[error("phone number has too many digits")]
  TooLong,
}

/// Normalises `raw` against `country_code` (digits only, e.g. `"254"`).
///
/// Recognised forms, all yielding `+2547XXXXXXXX` for Kenya:
/// `+2547XXXXXXXX`, `2547XXXXXXXX`, `07XXXXXXXX` and the bare `7XXXXXXXX`.
/// Any other all-digit input of plausible length is assumed to be a local
/// number and gets the country code prefixed, which is best effort only.
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, PhoneError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(PhoneError::Empty);
  }

  let (has_plus, rest) = match trimmed.strip_prefix('+') {
    Some(rest) => (true, rest),
    None => (false, trimmed),
  };

  let mut digits = String::with_capacity(rest.len());
  for c in rest.chars() {
    match c {
      '0'..='9' => digits.push(c),
      ' ' | '-' | '.' | '(' | ')' => {}
      _ => return Err(PhoneError::InvalidCharacters),
    }
  }

  if digits.len() < SUBSCRIBER_DIGITS {
    return Err(PhoneError::TooShort);
  }
  if digits.len() > MAX_E164_DIGITS {
    return Err(PhoneError::TooLong);
  }

  let subscriber = if digits.len() == country_code.len() + SUBSCRIBER_DIGITS && digits.starts_with(country_code) {
    &digits[country_code.len()..]
  } else if has_plus {
    // Some other country's number, already international.
    return Ok(format!("+{digits}"));
  } else if digits.len() == SUBSCRIBER_DIGITS + 1 && digits.starts_with('0') {
    &digits[1..]
  } else if digits.len() == SUBSCRIBER_DIGITS {
    digits.as_str()
  } else {
    let local = digits.trim_start_matches('0');
    if local.len() < SUBSCRIBER_DIGITS {
      return Err(PhoneError::TooShort);
    }
    if local.len() + country_code.len() > MAX_E164_DIGITS {
      return Err(PhoneError::TooLong);
    }
    local
  };

  Ok(format!("+{country_code}{subscriber}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn all_kenyan_forms_share_one_canonical_string() {
    let forms = ["+254712345678", "254712345678", "0712345678", "712345678"];
    for form in forms {
      assert_eq!(normalize_phone(form, "254").unwrap(), "+254712345678", "form {form}");
    }
  }

  #[test]
  fn separators_are_ignored() {
    assert_eq!(normalize_phone("+254 712-345.678", "254").unwrap(), "+254712345678");
    assert_eq!(normalize_phone("(0712) 345 678", "254").unwrap(), "+254712345678");
  }

  #[test]
  fn landline_and_airtel_prefixes_normalise_too() {
    assert_eq!(normalize_phone("0110345678", "254").unwrap(), "+254110345678");
    assert_eq!(normalize_phone("0733111222", "254").unwrap(), "+254733111222");
  }

  #[test]
  fn foreign_international_numbers_are_kept() {
    assert_eq!(normalize_phone("+256712345678", "254").unwrap(), "+256712345678");
  }

  #[test]
  fn unrecognised_local_forms_get_country_code() {
    assert_eq!(normalize_phone("00712345678", "254").unwrap(), "+254712345678");
    assert_eq!(normalize_phone("7123456789", "254").unwrap(), "+2547123456789");
  }

  #[test]
  fn rejects_garbage() {
    assert_eq!(normalize_phone("", "254"), Err(PhoneError::Empty));
    assert_eq!(normalize_phone("   ", "254"), Err(PhoneError::Empty));
    assert_eq!(normalize_phone("07123abc78", "254"), Err(PhoneError::InvalidCharacters));
    assert_eq!(normalize_phone("0712", "254"), Err(PhoneError::TooShort));
    assert_eq!(normalize_phone("1234567890123456", "254"), Err(PhoneError::TooLong));
  }
}
