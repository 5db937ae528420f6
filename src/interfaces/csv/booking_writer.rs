use crate::domain::booking::Booking;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Flat CSV row for one booking.
#[derive(Serialize)]
struct BookingRow<'a> {
    id: String,
    requester: &'a str,
    service_type: &'a str,
    urgency: &'a str,
    status: &'a str,
    amount: Decimal,
    assigned_truck: &'a str,
    resolved_by: &'a str,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a Booking> for BookingRow<'a> {
    fn from(b: &'a Booking) -> Self {
        Self {
            id: b.id.to_string(),
            requester: &b.requester,
            service_type: &b.service_type,
            urgency: b.urgency.as_str(),
            status: b.status.as_str(),
            amount: b.amount,
            assigned_truck: b.assigned_truck.as_deref().unwrap_or_default(),
            resolved_by: b.resolution.as_ref().map(|r| r.by()).unwrap_or_default(),
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
        }
    }
}

/// Writes bookings as CSV, header first.
pub struct BookingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(sink),
        }
    }

    /// Writes the header and every booking, then flushes. The header is
    /// written even when there are no bookings.
    pub fn write_bookings<'a, I>(&mut self, bookings: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        self.writer.write_record([
            "id",
            "requester",
            "service_type",
            "urgency",
            "status",
            "amount",
            "assigned_truck",
            "resolved_by",
            "created_at",
            "updated_at",
        ])?;
        for booking in bookings {
            self.writer.serialize(BookingRow::from(booking))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingAction, BookingDetails, CancellationPolicy};
    use chrono::Utc;

    fn booking(service_type: &str) -> Booking {
        Booking::new(
            "u1",
            BookingDetails {
                service_type: Some(service_type.to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_writes_header_and_rows() {
        let pending = booking("oil_change");
        let approved = booking("engine_repair")
            .transition(
                &BookingAction::Approve {
                    notes: None,
                    estimated_completion: None,
                    assigned_truck: Some("TRK-7".to_string()),
                },
                "a1",
                CancellationPolicy::PendingOnly,
                Utc::now(),
            )
            .unwrap();

        let mut out = Vec::new();
        BookingWriter::new(&mut out)
            .write_bookings([&pending, &approved])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,requester,service_type,urgency,status,amount"));
        assert!(lines[1].contains(",oil_change,normal,pending,2500,"));
        assert!(lines[2].contains(",engine_repair,normal,approved,15000,TRK-7,a1,"));
    }

    #[test]
    fn test_empty_export_has_header() {
        let mut out = Vec::new();
        BookingWriter::new(&mut out).write_bookings([]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim_end(),
            "id,requester,service_type,urgency,status,amount,assigned_truck,resolved_by,created_at,updated_at"
        );
    }
}
