// Composes the six daily events from the solar model and a method's angle table.
use crate::astro::{self, Direction, SUNRISE_SUNSET_DEPRESSION};
use crate::model::{CalculationMethod, DayTimes, GeoCoordinate, Madhab};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Inputs that fully determine a day's times (besides the date and zone).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationParams {
    pub location: GeoCoordinate,
    pub method: CalculationMethod,
    pub madhab: Madhab,
}

/// Computes the events of `date` as seen from `params.location`, with clock
/// times expressed in `tz`.
///
/// Events the sun cannot produce on that day (polar day/night, or the
/// literal 90 degree isha angle) come back as `None`.
pub fn compute_day_times<Tz: TimeZone>(
    date: NaiveDate,
    params: &CalculationParams,
    tz: &Tz,
) -> DayTimes {
    let angles = params.method.angles();
    let lat = params.location.latitude;
    let lng = params.location.longitude;

    let (midnight, offset_hours) = local_midnight(date, tz);
    let jd = astro::julian_date(date.year(), date.month(), date.day());

    let fajr = astro::time_for_depression(
        jd,
        lat,
        lng,
        angles.fajr,
        offset_hours,
        Direction::BeforeNoon,
    );
    let sunrise = astro::time_for_depression(
        jd,
        lat,
        lng,
        SUNRISE_SUNSET_DEPRESSION,
        offset_hours,
        Direction::BeforeNoon,
    );
    let dhuhr = astro::solar_noon(jd, lng, offset_hours);
    let asr = astro::asr_time(jd, lat, lng, params.madhab.shadow_factor(), offset_hours);
    let maghrib = astro::time_for_depression(
        jd,
        lat,
        lng,
        SUNRISE_SUNSET_DEPRESSION,
        offset_hours,
        Direction::AfterNoon,
    );
    let isha = astro::time_for_depression(
        jd,
        lat,
        lng,
        angles.isha,
        offset_hours,
        Direction::AfterNoon,
    );

    let at = |hours: Option<f64>| hours.map(|h| anchor(midnight, h));

    let times = DayTimes {
        date,
        fajr: at(fajr),
        sunrise: at(sunrise),
        dhuhr: Some(anchor(midnight, dhuhr)),
        asr: at(asr),
        maghrib: at(maghrib),
        isha: at(isha),
    };

    if !times.is_complete() {
        log::debug!(
            "{} at ({}, {}): no time for {:?}",
            date,
            lat,
            lng,
            times.missing()
        );
    }

    times
}

/// The UTC instant of local midnight on `date` and the zone's offset (hours)
/// at that instant.
fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, f64) {
    let naive = date.and_time(NaiveTime::MIN);
    // Resolving via the UTC reading avoids failing on zones whose DST switch
    // skips midnight.
    let offset = tz.offset_from_utc_datetime(&naive).fix();
    let seconds = offset.local_minus_utc() as i64;
    let midnight = naive.and_utc() - Duration::seconds(seconds);
    (midnight, seconds as f64 / 3600.0)
}

/// Converts hours from local midnight to an instant. Values below zero or
/// past 24 land on the neighbouring day.
fn anchor(midnight: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    midnight + Duration::seconds((hours * 3600.0) as i64)
}
