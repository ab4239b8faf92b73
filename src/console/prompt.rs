use crate::draft::{Gender, GoatAttributes, KNOWN_BREEDS};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_birth_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| format!("'{}' is not a date like 2024-03-01", input.trim()))
}

/// Comma-separated health tags; blanks are dropped
pub fn parse_health_tags(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    current: &str,
) -> io::Result<Option<String>> {
    if current.is_empty() {
        write!(output, "{}: ", label)?;
    } else {
        write!(output, "{} [{}]: ", label, current)?;
    }
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    Ok(Some(if line.is_empty() {
        current.to_string()
    } else {
        line.to_string()
    }))
}

/// Ask for every detail, offering the current values as defaults.
///
/// Stops asking at end of input and returns what was gathered; the caller
/// decides whether the result is complete.
pub fn read_attributes<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    current: &GoatAttributes,
    suggested_name: Option<&str>,
) -> io::Result<GoatAttributes> {
    let mut attributes = current.clone();

    let name_default = if attributes.name.is_empty() {
        suggested_name.unwrap_or_default().to_string()
    } else {
        attributes.name.clone()
    };
    match ask(input, output, "Name", &name_default)? {
        Some(name) => attributes.name = name,
        None => return Ok(attributes),
    }

    loop {
        let current_gender = attributes.gender.map(|g| g.to_string()).unwrap_or_default();
        let Some(answer) = ask(input, output, "Gender (Male/Female)", &current_gender)? else {
            return Ok(attributes);
        };
        if answer.is_empty() {
            break;
        }
        match answer.parse::<Gender>() {
            Ok(gender) => {
                attributes.gender = Some(gender);
                break;
            }
            Err(e) => writeln!(output, "{}", e)?,
        }
    }

    writeln!(output, "Breeds: {}", KNOWN_BREEDS.join(", "))?;
    match ask(input, output, "Breed", &attributes.breed)? {
        Some(breed) => attributes.breed = breed,
        None => return Ok(attributes),
    }

    loop {
        let current_date = attributes
            .birth_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        let Some(answer) = ask(input, output, "Birth date (YYYY-MM-DD)", &current_date)? else {
            return Ok(attributes);
        };
        if answer.is_empty() {
            break;
        }
        match parse_birth_date(&answer) {
            Ok(date) => {
                attributes.birth_date = Some(date);
                break;
            }
            Err(e) => writeln!(output, "{}", e)?,
        }
    }

    let current_tags = attributes
        .health_status
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let health_prompt = "Health status (comma separated, - for none)";
    if let Some(answer) = ask(input, output, health_prompt, &current_tags)? {
        attributes.health_status = if answer == "-" {
            BTreeSet::new()
        } else {
            parse_health_tags(&answer)
        };
    }

    Ok(attributes)
}
