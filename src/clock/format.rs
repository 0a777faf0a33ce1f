use chrono::{NaiveTime, Timelike};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum DisplayFormat {
    #[default]
    Hour24,
    Hour12,
}

impl DisplayFormat {
    pub fn from_24h_flag(use_24h: bool) -> Self {
        if use_24h {
            DisplayFormat::Hour24
        } else {
            DisplayFormat::Hour12
        }
    }

    pub fn is_24h(self) -> bool {
        self == DisplayFormat::Hour24
    }

    pub fn toggled(self) -> Self {
        match self {
            DisplayFormat::Hour24 => DisplayFormat::Hour12,
            DisplayFormat::Hour12 => DisplayFormat::Hour24,
        }
    }
}

pub fn hour12(hour: u32) -> (u32, bool) {
    let display = match hour % 12 {
        0 => 12,
        other => other,
    };
    (display, hour >= 12)
}

pub fn format_hms(hour: u32, minute: u32, second: Option<u32>, format: DisplayFormat) -> String {
    match format {
        DisplayFormat::Hour24 => match second {
            Some(second) => format!("{hour:02}:{minute:02}:{second:02}"),
            None => format!("{hour:02}:{minute:02}"),
        },
        DisplayFormat::Hour12 => {
            let (display_hour, is_pm) = hour12(hour);
            let meridiem = if is_pm { "PM" } else { "AM" };
            match second {
                Some(second) => format!("{display_hour:02}:{minute:02}:{second:02} {meridiem}"),
                None => format!("{display_hour:02}:{minute:02} {meridiem}"),
            }
        }
    }
}

pub fn format_clock(time: NaiveTime, format: DisplayFormat) -> String {
    format_hms(time.hour(), time.minute(), Some(time.second()), format)
}

pub fn format_alarm(hour: u32, minute: u32, format: DisplayFormat) -> String {
    format_hms(hour, minute, None, format)
}
