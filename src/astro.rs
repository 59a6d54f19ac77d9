// Simplified solar-position model used to place the daily prayer events.
//
// All functions are pure. Times are returned as hours from local midnight and
// may fall outside [0, 24) when an event crosses into the neighbouring day;
// callers anchor them to an instant instead of clamping.

/// Sun altitude (degrees below the horizon) used for sunrise and sunset.
/// Accounts for atmospheric refraction plus the solar radius.
pub const SUNRISE_SUNSET_DEPRESSION: f64 = 0.833;

/// Julian date of the J2000.0 epoch.
const J2000: f64 = 2451545.0;

/// Which side of solar noon an event falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    BeforeNoon,
    AfterNoon,
}

/// Position of the sun for a given Julian date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    /// Declination in degrees.
    pub declination: f64,
    /// Equation of time in hours, wrapped into [-12, 12).
    pub equation_of_time: f64,
}

/// Julian date at 0h UT of the given proleptic Gregorian calendar day.
pub fn julian_date(year: i32, month: u32, day: u32) -> f64 {
    let (mut y, mut m) = (year as f64, month as f64);
    if month <= 2 {
        y -= 1.0;
        m += 12.0;
    }
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + b - 1524.5
}

/// Computes declination and equation of time for a Julian date.
pub fn sun_position(jd: f64) -> SunPosition {
    let d = jd - J2000;

    let g = (357.529 + 0.98560028 * d).rem_euclid(360.0);
    let q = (280.459 + 0.98564736 * d).rem_euclid(360.0);
    let l = (q + 1.915 * dsin(g) + 0.020 * dsin(2.0 * g)).rem_euclid(360.0);
    let e = 23.439 - 0.00000036 * d;

    let ra = (dcos(e) * dsin(l)).atan2(dcos(l)).to_degrees();
    let declination = (dsin(e) * dsin(l)).asin().to_degrees();

    // q lives in [0, 360) while atan2 yields (-180, 180]; their difference is
    // only meaningful modulo a full turn.
    let mut diff = (q - ra).rem_euclid(360.0);
    if diff >= 180.0 {
        diff -= 360.0;
    }

    SunPosition {
        declination,
        equation_of_time: diff / 15.0,
    }
}

/// Hours between solar noon and the moment the sun reaches `altitude`
/// degrees (negative below the horizon).
///
/// Returns `None` when the sun never reaches that altitude on this day,
/// which happens at high latitudes around the solstices.
pub fn hour_angle(latitude: f64, declination: f64, altitude: f64) -> Option<f64> {
    let cos_h = (dsin(altitude) - dsin(latitude) * dsin(declination))
        / (dcos(latitude) * dcos(declination));

    if !cos_h.is_finite() || !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }

    Some(cos_h.acos().to_degrees() / 15.0)
}

/// Local clock time (hours) of solar noon: the meridian transit.
pub fn solar_noon(jd: f64, longitude: f64, utc_offset_hours: f64) -> f64 {
    let sun = sun_position(jd);
    noon_for(&sun, longitude, utc_offset_hours)
}

/// Local clock time (hours) at which the sun is `depression` degrees below
/// the horizon on the given side of noon.
pub fn time_for_depression(
    jd: f64,
    latitude: f64,
    longitude: f64,
    depression: f64,
    utc_offset_hours: f64,
    direction: Direction,
) -> Option<f64> {
    let sun = sun_position(jd);
    let t = hour_angle(latitude, sun.declination, -depression)?;
    let noon = noon_for(&sun, longitude, utc_offset_hours);

    Some(match direction {
        Direction::BeforeNoon => noon - t,
        Direction::AfterNoon => noon + t,
    })
}

/// Sun altitude at which an object's shadow equals `shadow_factor` times its
/// length plus the noon shadow.
pub fn asr_altitude(latitude: f64, declination: f64, shadow_factor: f64) -> f64 {
    (1.0 / (shadow_factor + dtan((latitude - declination).abs())))
        .atan()
        .to_degrees()
}

/// Local clock time (hours) of the afternoon shadow-ratio event.
pub fn asr_time(
    jd: f64,
    latitude: f64,
    longitude: f64,
    shadow_factor: f64,
    utc_offset_hours: f64,
) -> Option<f64> {
    let sun = sun_position(jd);
    let altitude = asr_altitude(latitude, sun.declination, shadow_factor);
    let t = hour_angle(latitude, sun.declination, altitude)?;
    Some(noon_for(&sun, longitude, utc_offset_hours) + t)
}

fn noon_for(sun: &SunPosition, longitude: f64, utc_offset_hours: f64) -> f64 {
    12.0 + utc_offset_hours - longitude / 15.0 - sun.equation_of_time
}

fn dsin(deg: f64) -> f64 {
    deg.to_radians().sin()
}

fn dcos(deg: f64) -> f64 {
    deg.to_radians().cos()
}

fn dtan(deg: f64) -> f64 {
    deg.to_radians().tan()
}
