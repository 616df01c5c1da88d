//! Built-in booking list
//!
//! Served when the bookings API is unreachable, and used to seed the mock
//! API server.

use shared::booking::BookingStatus;
use shared::models::{Booking, BookingCore, ServiceDetail};

#[allow(clippy::too_many_arguments)]
fn seed(
    id: i64,
    name: &str,
    phone: &str,
    service: &str,
    date: &str,
    time: &str,
    address: &str,
    status: BookingStatus,
    detail: ServiceDetail,
    staff: u32,
    total: i64,
    points: i64,
    note: &str,
) -> Booking {
    Booking {
        id,
        core: BookingCore {
            name: name.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            service: service.to_string(),
            total,
            staff,
            note: note.to_string(),
            detail,
            size: None,
            zalo_id: None,
        },
        status,
        points: Some(points),
        created_at: None,
    }
}

/// The five demo bookings
pub fn mock_bookings() -> Vec<Booking> {
    vec![
        seed(
            1,
            "Tăng Thị Phương Quynh",
            "0909123456",
            "Tổng vệ sinh nhà",
            "30/10/2025",
            "14:30",
            "123 Nguyễn Văn Linh, Quận 7, TP.HCM",
            BookingStatus::Pending,
            ServiceDetail::Hourly { hours: 4.0 },
            2,
            800_000,
            40,
            "Cần vệ sinh kỹ phòng khách và bếp",
        ),
        seed(
            2,
            "Nguyễn Văn Nam",
            "0987654321",
            "Vệ sinh điều hòa",
            "31/10/2025",
            "09:00",
            "456 Lê Văn Việt, Quận 9, TP.HCM",
            BookingStatus::Confirmed,
            ServiceDetail::Timed { duration: 2.0 },
            1,
            600_000,
            30,
            "2 máy điều hòa",
        ),
        seed(
            3,
            "Lê Thị Mai",
            "0912345678",
            "Vệ sinh văn phòng",
            "01/11/2025",
            "08:00",
            "789 Võ Văn Tần, Quận 3, TP.HCM",
            BookingStatus::Completed,
            ServiceDetail::Area { area: 100.0 },
            3,
            5_000_000,
            250,
            "Văn phòng 100m², cần vệ sinh định kỳ hàng tuần",
        ),
        seed(
            4,
            "Trần Văn Đức",
            "0898765432",
            "Giặt rèm, sofa",
            "02/11/2025",
            "13:30",
            "321 Nguyễn Thị Minh Khai, Quận 1, TP.HCM",
            BookingStatus::Cancelled,
            ServiceDetail::Timed { duration: 1.0 },
            2,
            500_000,
            25,
            "1 bộ sofa 3 chỗ ngồi",
        ),
        seed(
            5,
            "Phạm Thị Lan",
            "0901234567",
            "Tổng vệ sinh nhà",
            "03/11/2025",
            "10:00",
            "654 Cách Mạng Tháng 8, Quận 10, TP.HCM",
            BookingStatus::Pending,
            ServiceDetail::Hourly { hours: 6.0 },
            3,
            1_200_000,
            60,
            "Nhà 2 tầng, cần vệ sinh tổng thể",
        ),
    ]
}
