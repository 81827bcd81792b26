//! Validation utilities for Stokku

use rust_decimal::Decimal;

// ============================================================================
// Inventory Validations
// ============================================================================

/// Validate a SKU: non-blank, at most 255 characters, no inner whitespace
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    let trimmed = sku.trim();
    if trimmed.is_empty() {
        return Err("SKU is required");
    }
    if trimmed.chars().count() > 255 {
        return Err("SKU must be at most 255 characters");
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err("SKU cannot contain whitespace");
    }
    Ok(())
}

/// Validate an optional unit price
pub fn validate_price(price: Option<Decimal>) -> Result<(), &'static str> {
    match price {
        Some(p) if p < Decimal::ZERO => Err("Price cannot be negative"),
        _ => Ok(()),
    }
}

/// Validate a stock level or reorder threshold
pub fn validate_stock_level(value: i64) -> Result<(), &'static str> {
    if value < 0 {
        return Err("Stock values cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Upload Validations
// ============================================================================

pub const ITEM_IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif"];
pub const ITEM_IMAGE_MAX_BYTES: usize = 2 * 1024 * 1024;
pub const AVATAR_EXTENSIONS: &[&str] = ITEM_IMAGE_EXTENSIONS;
pub const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

pub const ATTENDANCE_PHOTO_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];
pub const ATTENDANCE_PHOTO_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Extract and check a file extension against an allow-list (case-insensitive)
pub fn validate_upload_extension(
    filename: &str,
    allowed: &[&str],
) -> Result<String, &'static str> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or("File has no extension")?;

    if allowed.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err("File type is not allowed")
    }
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a latitude/longitude pair when present
pub fn validate_coordinates(
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
) -> Result<(), &'static str> {
    if let Some(lat) = latitude {
        if lat < Decimal::from(-90) || lat > Decimal::from(90) {
            return Err("Latitude must be between -90 and 90");
        }
    }
    if let Some(lng) = longitude {
        if lng < Decimal::from(-180) || lng > Decimal::from(180) {
            return Err("Longitude must be between -180 and 180");
        }
    }
    Ok(())
}
