use autoscale_cuckoo_filter::CuckooFilter;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 10_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fast negative check for registered emails. A `false` from [`might_exist`] is
/// definitive; `true` needs confirming against the cache or the store.
///
/// [`might_exist`]: EmailFilter::might_exist
pub struct EmailFilter {
    inner: RwLock<CuckooFilter<String>>,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            inner: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }
}

impl EmailFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poisoned lock answers "maybe", which only costs a store lookup.
    pub fn might_exist(&self, email: &str) -> bool {
        let email = normalize(email);
        self.inner.read().map(|f| f.contains(&email)).unwrap_or(true)
    }

    pub fn insert(&self, email: &str) {
        let email = normalize(email);
        if let Ok(mut filter) = self.inner.write() {
            filter.add(&email);
        }
    }

    pub fn remove(&self, email: &str) {
        let email = normalize(email);
        if let Ok(mut filter) = self.inner.write() {
            filter.remove(&email);
        }
    }

    pub fn insert_batch(&self, emails: &[String]) {
        if let Ok(mut filter) = self.inner.write() {
            for email in emails {
                filter.add(&normalize(email));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_emails_are_found_case_insensitively() {
        let filter = EmailFilter::new();
        assert!(!filter.might_exist("jane@company.com"));
        filter.insert("Jane@Company.com ");
        assert!(filter.might_exist("jane@company.com"));
        filter.remove("JANE@company.com");
        assert!(!filter.might_exist("jane@company.com"));
    }
}
