use crate::utils::AdmissionError;

/// Validates queue room for one more item
pub fn check_capacity(current_len: usize, capacity: usize) -> Result<(), AdmissionError> {
    if current_len >= capacity {
        return Err(AdmissionError::QueueFull { capacity });
    }
    Ok(())
}

/// Validates header pixel dimensions against the per-side limit.
///
/// `None` means the header could not be read; such sources are
/// accepted and left for the worker to fail on if they really are broken.
pub fn check_dimensions(dimensions: Option<(u32, u32)>, limit: u32) -> Result<(), AdmissionError> {
    match dimensions {
        Some((width, height)) if width > limit || height > limit => {
            Err(AdmissionError::Oversize { width, height, limit })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_limit_is_inclusive() {
        assert!(check_dimensions(Some((8192, 8192)), 8192).is_ok());
        assert!(check_dimensions(Some((8193, 10)), 8192).is_err());
        assert!(check_dimensions(Some((10, 8193)), 8192).is_err());
        assert!(check_dimensions(None, 8192).is_ok());
    }

    #[test]
    fn capacity_is_a_hard_cap() {
        assert!(check_capacity(29, 30).is_ok());
        assert_eq!(check_capacity(30, 30), Err(AdmissionError::QueueFull { capacity: 30 }));
    }
}
