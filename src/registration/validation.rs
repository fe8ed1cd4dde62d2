use super::errors::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullName {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub region: String,
    pub district: String,
    pub school: String,
}

pub const MIN_GRADE: i32 = 1;
pub const MAX_GRADE: i32 = 11;

/// First token is the given name, the remaining tokens joined by single spaces are the family name.
pub fn parse_full_name(input: &str) -> Result<FullName, ValidationError> {
    let mut parts = input.split_whitespace();
    let first_name = parts.next().ok_or(ValidationError::FullName)?;
    let last_name = parts.collect::<Vec<_>>().join(" ");
    if last_name.is_empty() {
        return Err(ValidationError::FullName);
    }

    Ok(FullName {
        first_name: first_name.to_string(),
        last_name,
    })
}

pub fn parse_location(input: &str) -> Result<Location, ValidationError> {
    let parts: Vec<&str> = input.split(',').collect();
    if parts.len() < 3 {
        return Err(ValidationError::Location);
    }

    let region = parts[0].trim();
    let district = parts[1].trim();
    let school = parts[2..].join(",");
    let school = school.trim();
    if region.is_empty() || district.is_empty() || school.is_empty() {
        return Err(ValidationError::Location);
    }

    Ok(Location {
        region: region.to_string(),
        district: district.to_string(),
        school: school.to_string(),
    })
}

pub fn parse_grade(input: &str) -> Result<i32, ValidationError> {
    input
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|g| (MIN_GRADE..=MAX_GRADE).contains(g))
        .ok_or(ValidationError::Grade)
}

/// Normalizes a phone number to `<prefix>` followed by nine digits.
pub fn normalize_phone(input: &str, country_prefix: &str) -> Result<String, ValidationError> {
    let mut phone: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '+' | '-' | '(' | ')'))
        .collect();

    if !phone.starts_with(country_prefix) && phone.chars().count() == 9 {
        phone = format!("{}{}", country_prefix, phone);
    }

    let local = phone
        .strip_prefix(country_prefix)
        .ok_or(ValidationError::Phone)?;
    if local.len() != 9 || !local.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::Phone);
    }

    Ok(phone)
}
