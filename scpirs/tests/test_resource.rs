//! Tests for parsing resource addresses.

use rstest::*;

use scpirs::{InstrumentError, ResourceAddress, SCPI_RAW_PORT, UsbAddress, UsbResource};

fn usb(vendor_id: u16, product_id: u16, serial: &str, interface: Option<u8>) -> ResourceAddress {
    ResourceAddress::Usb(UsbAddress {
        board: 0,
        vendor_id,
        product_id,
        serial: serial.to_string(),
        interface,
    })
}

#[rstest]
#[case("USB0::0x0957::0x17BC::MY56310625::INSTR", usb(0x0957, 0x17BC, "MY56310625", None))]
#[case("usb0::0x1AB1::0x044C::DHO9A000000001::instr", usb(0x1AB1, 0x044C, "DHO9A000000001", None))]
#[case("USB::4883::32847::M01053290::0::INSTR", usb(4883, 32847, "M01053290", Some(0)))]
fn parse_usb(#[case] resource: &str, #[case] expected: ResourceAddress) {
    assert_eq!(resource.parse::<ResourceAddress>().unwrap(), expected);
}

#[rstest]
#[case("TCPIP0::172.16.2.13::INSTR", "172.16.2.13", SCPI_RAW_PORT)]
#[case("TCPIP::scope.lab.local::inst0::INSTR", "scope.lab.local", SCPI_RAW_PORT)]
#[case("TCPIP0::192.168.1.100::5555::SOCKET", "192.168.1.100", 5555)]
fn parse_tcpip(#[case] resource: &str, #[case] host_exp: &str, #[case] port_exp: u16) {
    match resource.parse::<ResourceAddress>().unwrap() {
        ResourceAddress::TcpIp { board, host, port } => {
            assert_eq!(board, 0);
            assert_eq!(host, host_exp);
            assert_eq!(port, port_exp);
        }
        other => panic!("Expected a TCP/IP address, got {other:?}"),
    }
}

#[rstest]
fn parse_serial_path() {
    assert_eq!(
        "ASRL/dev/ttyUSB0::INSTR".parse::<ResourceAddress>().unwrap(),
        ResourceAddress::Serial {
            port: "/dev/ttyUSB0".to_string()
        }
    );
}

#[rstest]
#[case("")]
#[case("172.16.2.13")]
#[case("GPIB0::7::INSTR")]
#[case("USB0::0x0957::0x17BC::INSTR")]
#[case("USB0::0xXYZ::0x17BC::MY56310625::INSTR")]
#[case("USB0::0x0957::0x17BC::MY56310625::SOCKET")]
#[case("TCPIP0::::INSTR")]
#[case("TCPIP0::192.168.1.100::SOCKET")]
#[case("TCPIP0::192.168.1.100::port::SOCKET")]
#[case("ASRL::INSTR")]
fn parse_invalid(#[case] resource: &str) {
    match resource.parse::<ResourceAddress>() {
        Err(InstrumentError::InvalidResource(res)) => assert_eq!(res, resource),
        other => panic!("Expected invalid resource error, got {other:?}"),
    }
}

/// Formatting a USB address gives the canonical resource string.
#[rstest]
fn usb_address_display() {
    let addr = UsbAddress {
        board: 0,
        vendor_id: 0x957,
        product_id: 0x17bc,
        serial: "MY56310625".to_string(),
        interface: None,
    };
    assert_eq!(addr.to_string(), "USB0::0x0957::0x17BC::MY56310625::INSTR");

    let addr = UsbAddress {
        interface: Some(1),
        ..addr
    };
    assert_eq!(addr.to_string(), "USB0::0x0957::0x17BC::MY56310625::1::INSTR");
    assert_eq!(
        addr.to_string().parse::<ResourceAddress>().unwrap(),
        ResourceAddress::Usb(addr)
    );
}

#[rstest]
fn usb_resource_identities() {
    let res = UsbResource {
        address: "USB0::0x0957::0x17BC::MY56310625::INSTR".to_string(),
        manufacturer: Some("Keysight Technologies".to_string()),
        product: Some("MSO-X 4154A".to_string()),
        serial: "MY56310625".to_string(),
    };
    assert_eq!(
        res.identities(),
        vec!["MY56310625", "MSO-X 4154A", "Keysight Technologies"]
    );

    let res = UsbResource::new("USB0::0x1AB1::0x044C::DHO9A000000001::INSTR");
    assert_eq!(res.serial, "DHO9A000000001");
    assert_eq!(res.identities(), vec!["DHO9A000000001"]);
}

/// A device without serial number is identified by its descriptors only.
#[rstest]
fn usb_resource_identities_without_serial() {
    let res = UsbResource {
        address: "USB0::0x1AB1::0x044C::::INSTR".to_string(),
        manufacturer: Some("Rigol Technologies".to_string()),
        product: Some("DHO924S".to_string()),
        serial: String::new(),
    };
    assert_eq!(res.identities(), vec!["DHO924S", "Rigol Technologies"]);
    assert_eq!(UsbResource::new("garbage").serial, "");
}
