// Tests for daily prayer time computation across locations and methods.
use awqat::engine::{CalculationParams, compute_day_times};
use awqat::model::{CalculationMethod, GeoCoordinate, Madhab, PrayerEvent};
use chrono::{FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use strum::IntoEnumIterator;

fn params(lat: f64, lng: f64, method: CalculationMethod, madhab: Madhab) -> CalculationParams {
    CalculationParams {
        location: GeoCoordinate::new(lat, lng).unwrap(),
        method,
        madhab,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn local_time(t: chrono::DateTime<Utc>, tz: &FixedOffset) -> NaiveTime {
    t.with_timezone(tz).time()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_mecca_summer_solstice() {
    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    let p = params(
        21.4225,
        39.8262,
        CalculationMethod::MuslimWorldLeague,
        Madhab::Shafi,
    );
    let times = compute_day_times(date(2024, 6, 21), &p, &tz);

    assert!(times.is_complete(), "missing: {:?}", times.missing());

    let dhuhr = local_time(times.dhuhr.unwrap(), &tz);
    assert!(
        dhuhr > hm(12, 18) && dhuhr < hm(12, 26),
        "dhuhr at {}",
        dhuhr
    );

    let sunrise = local_time(times.sunrise.unwrap(), &tz);
    assert!(sunrise > hm(5, 20) && sunrise < hm(5, 55), "sunrise at {}", sunrise);

    let maghrib = local_time(times.maghrib.unwrap(), &tz);
    assert!(maghrib > hm(18, 50) && maghrib < hm(19, 20), "maghrib at {}", maghrib);

    // Strictly increasing through the day
    let present: Vec<_> = times.present().into_iter().map(|(_, t)| t).collect();
    assert_eq!(present.len(), 6);
    assert!(present.windows(2).all(|w| w[0] < w[1]));

    // Whole seconds only
    for (_, t) in times.present() {
        assert_eq!(t.nanosecond(), 0);
    }
}

#[test]
fn test_hanafi_asr_is_later() {
    let tz = FixedOffset::east_opt(3600).unwrap();
    let d = date(2024, 3, 15);
    let shafi = compute_day_times(
        d,
        &params(48.8566, 2.3522, CalculationMethod::MuslimWorldLeague, Madhab::Shafi),
        &tz,
    );
    let hanafi = compute_day_times(
        d,
        &params(48.8566, 2.3522, CalculationMethod::MuslimWorldLeague, Madhab::Hanafi),
        &tz,
    );

    assert!(hanafi.asr.unwrap() > shafi.asr.unwrap());
    // Only asr depends on the madhab
    assert_eq!(hanafi.fajr, shafi.fajr);
    assert_eq!(hanafi.isha, shafi.isha);
}

#[test]
fn test_arctic_summer_has_no_twilight_events() {
    let tz = FixedOffset::east_opt(3600).unwrap();
    let p = params(75.0, 15.0, CalculationMethod::MuslimWorldLeague, Madhab::Shafi);
    let times = compute_day_times(date(2024, 6, 21), &p, &tz);

    assert!(times.fajr.is_none());
    assert!(times.sunrise.is_none());
    assert!(times.maghrib.is_none());
    assert!(times.isha.is_none());
    assert!(times.dhuhr.is_some());
    assert!(times.asr.is_some());
    assert!(!times.is_complete());
}

#[test]
fn test_computation_is_deterministic() {
    let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    let p = params(40.7128, -74.006, CalculationMethod::NorthAmerica, Madhab::Hanafi);
    let a = compute_day_times(date(2025, 1, 10), &p, &tz);
    let b = compute_day_times(date(2025, 1, 10), &p, &tz);
    assert_eq!(a, b);
}

#[test]
fn test_events_ordered_up_to_sixty_degrees() {
    let dates = [
        date(2024, 1, 1),
        date(2024, 3, 20),
        date(2024, 6, 21),
        date(2024, 9, 23),
        date(2024, 12, 21),
    ];
    let longitudes: [f64; 4] = [-122.0, 0.1, 39.8, 151.2];

    for lat in (-60..=60).step_by(5).map(f64::from) {
        for lng in longitudes {
            // Clock zone roughly matching the longitude
            let tz = FixedOffset::east_opt(((lng / 15.0).round() as i32) * 3600).unwrap();
            for method in CalculationMethod::iter() {
                for madhab in [Madhab::Shafi, Madhab::Hanafi] {
                    for d in dates {
                        let times = compute_day_times(d, &params(lat, lng, method, madhab), &tz);
                        let present = times.present();
                        assert!(
                            present.windows(2).all(|w| w[0].1 < w[1].1),
                            "{}/{} at ({}, {}) on {}: {:?}",
                            method,
                            madhab,
                            lat,
                            lng,
                            d,
                            present
                        );

                        let mut required = vec![
                            PrayerEvent::Sunrise,
                            PrayerEvent::Dhuhr,
                            PrayerEvent::Asr,
                            PrayerEvent::Maghrib,
                        ];
                        // Beyond 45 degrees summer twilight can last all night
                        if lat.abs() <= 45.0 {
                            required.push(PrayerEvent::Fajr);
                        }
                        for event in required {
                            assert!(
                                times.get(event).is_some(),
                                "{} missing for {}/{} at ({}, {}) on {}",
                                event,
                                method,
                                madhab,
                                lat,
                                lng,
                                d
                            );
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_ninety_degree_isha_methods_have_no_isha() {
    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    for method in [CalculationMethod::UmmAlQura, CalculationMethod::Qatar] {
        let times = compute_day_times(
            date(2024, 6, 21),
            &params(21.4225, 39.8262, method, Madhab::Shafi),
            &tz,
        );
        assert!(times.isha.is_none(), "{} produced an isha time", method);
        assert!(times.fajr.is_some());
        assert!(times.maghrib.is_some());
    }
}

#[test]
fn test_display_zone_does_not_move_instants() {
    // Same location, zones one hour apart: the instants match as long as
    // local midnight falls on the same side of the events.
    let p = params(30.0444, 31.2357, CalculationMethod::Egyptian, Madhab::Shafi);
    let d = date(2024, 10, 1);
    let a = compute_day_times(d, &p, &FixedOffset::east_opt(2 * 3600).unwrap());
    let b = compute_day_times(d, &p, &FixedOffset::east_opt(3 * 3600).unwrap());

    for event in PrayerEvent::iter() {
        let (ta, tb) = (a.get(event).unwrap(), b.get(event).unwrap());
        assert!(
            (ta - tb).num_seconds().abs() <= 60,
            "{}: {} vs {}",
            event,
            ta,
            tb
        );
    }
}

#[test]
fn test_next_event() {
    let tz = FixedOffset::east_opt(3 * 3600).unwrap();
    let p = params(
        21.4225,
        39.8262,
        CalculationMethod::MuslimWorldLeague,
        Madhab::Shafi,
    );
    let times = compute_day_times(date(2024, 6, 21), &p, &tz);

    let dhuhr = times.dhuhr.unwrap();
    let (next, at) = times.next_event(dhuhr).unwrap();
    assert_eq!(next, PrayerEvent::Asr);
    assert_eq!(Some(at), times.asr);

    assert!(times.next_event(times.isha.unwrap()).is_none());
}
