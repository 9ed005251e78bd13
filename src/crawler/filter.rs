//! Per-search filter rules, applied when a candidate would become a new
//! record. Pure: no clock, no store, no side effects.

use chrono::{DateTime, Duration, Utc};

use crate::models::{ListingCandidate, SearchDefinition};

/// Evaluate a candidate against a search's rules, first failure wins.
///
/// Order: age, price bounds, exclude keywords, include keywords, minimum
/// images, excluded sellers. Keyword and seller comparisons trim and
/// lowercase both sides.
pub fn passes(candidate: &ListingCandidate, search: &SearchDefinition, now: DateTime<Utc>) -> bool {
    if let Some(published) = candidate.published_at {
        if published < now - Duration::days(search.max_age_days) {
            return false;
        }
    }

    if let Some(min) = search.price_min {
        if candidate.price < min {
            return false;
        }
    }
    if let Some(max) = search.price_max {
        if candidate.price > max {
            return false;
        }
    }

    let haystack = format!("{} {}", candidate.title, candidate.description).to_lowercase();

    if keywords(&search.filters.exclude_keywords).any(|kw| haystack.contains(&kw)) {
        return false;
    }

    let includes: Vec<String> = keywords(&search.filters.include_keywords).collect();
    if !includes.is_empty() && !includes.iter().any(|kw| haystack.contains(kw.as_str())) {
        return false;
    }

    if let Some(min_images) = search.filters.min_images {
        if candidate.images.len() < min_images {
            return false;
        }
    }

    if let Some(seller) = &candidate.seller_name {
        let seller = seller.trim().to_lowercase();
        if keywords(&search.filters.exclude_sellers).any(|s| seller.contains(&s)) {
            return false;
        }
    }

    true
}

fn keywords(list: &[String]) -> impl Iterator<Item = String> + '_ {
    list.iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate() -> ListingCandidate {
        ListingCandidate {
            external_id: "1".into(),
            title: "Predám osciloskop Tektronix".into(),
            description: "Funkčný, málo používaný.".into(),
            price: 120,
            currency: "€".into(),
            location: Location::default(),
            seller_name: Some("Ján Novák".into()),
            seller_phone: None,
            seller_email: None,
            source_url: "https://bazos.sk/inzerat/1/x.php".into(),
            published_at: Some(now() - Duration::days(1)),
            view_count: 10,
            is_available: true,
            images: vec!["a.jpg".into(), "b.jpg".into()],
            crawled_at: now(),
        }
    }

    fn search() -> SearchDefinition {
        SearchDefinition::new(1, "osciloskop")
    }

    #[test]
    fn default_search_accepts_candidate() {
        assert!(passes(&candidate(), &search(), now()));
    }

    #[test]
    fn too_old_is_rejected_but_unknown_date_passes() {
        let mut s = search();
        s.max_age_days = 3;

        let mut c = candidate();
        c.published_at = Some(now() - Duration::days(10));
        assert!(!passes(&c, &s, now()));

        c.published_at = None;
        assert!(passes(&c, &s, now()));
    }

    #[test]
    fn price_bounds() {
        let mut s = search();
        s.price_min = Some(100);
        s.price_max = Some(200);
        assert!(passes(&candidate(), &s, now()));

        let mut c = candidate();
        c.price = 99;
        assert!(!passes(&c, &s, now()));
        c.price = 201;
        assert!(!passes(&c, &s, now()));
        c.price = 200;
        assert!(passes(&c, &s, now()));
    }

    #[test]
    fn exclude_keywords_match_title_or_description_case_insensitively() {
        let mut s = search();
        s.filters.exclude_keywords = vec!["POKAZENÝ".into(), " tektronix ".into()];
        assert!(!passes(&candidate(), &s, now()));

        s.filters.exclude_keywords = vec!["používaný".into()];
        assert!(!passes(&candidate(), &s, now()));

        s.filters.exclude_keywords = vec!["nič".into()];
        assert!(passes(&candidate(), &s, now()));
    }

    #[test]
    fn include_keywords_require_at_least_one_match() {
        let mut s = search();
        s.filters.include_keywords = vec!["rigol".into(), "Tektronix".into()];
        assert!(passes(&candidate(), &s, now()));

        s.filters.include_keywords = vec!["rigol".into(), "siglent".into()];
        assert!(!passes(&candidate(), &s, now()));

        // entries that trim to nothing do not force a match
        s.filters.include_keywords = vec!["  ".into()];
        assert!(passes(&candidate(), &s, now()));
    }

    #[test]
    fn minimum_image_count() {
        let mut s = search();
        s.filters.min_images = Some(3);
        assert!(!passes(&candidate(), &s, now()));
        s.filters.min_images = Some(2);
        assert!(passes(&candidate(), &s, now()));
    }

    #[test]
    fn excluded_seller_fragment_rejects() {
        let mut s = search();
        s.filters.exclude_sellers = vec!["novák".into()];
        assert!(!passes(&candidate(), &s, now()));

        // no seller name means the rule cannot match
        let mut c = candidate();
        c.seller_name = None;
        assert!(passes(&c, &s, now()));
    }

    #[test]
    fn adding_an_exclude_keyword_never_grows_the_accepted_set() {
        let candidates = vec![candidate(), {
            let mut c = candidate();
            c.title = "Predám multimeter".into();
            c
        }];

        let base = search();
        let mut stricter = search();
        stricter.filters.exclude_keywords = vec!["osciloskop".into()];

        let accepted = |s: &SearchDefinition| {
            candidates
                .iter()
                .filter(|c| passes(c, s, now()))
                .count()
        };
        assert!(accepted(&stricter) <= accepted(&base));
    }
}
