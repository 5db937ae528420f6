pub mod booking_writer;
