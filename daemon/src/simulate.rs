//! A scripted module for running without hardware.

use alert_modem::call::sanitize_number;
use alert_modem::transport::MemoryTransport;

/// A module that answers every query of a healthy registration and accepts
/// calls to `numbers`.
pub fn simulated_module(numbers: &[String]) -> MemoryTransport {
    let (transport, module) = MemoryTransport::new();

    module.reply_to("AT", ["OK"]);
    module.reply_to("AT+CSQ", ["+CSQ: 21,99", "OK"]);
    module.reply_to("AT+CREG?", ["+CREG: 0,1", "OK"]);
    module.reply_to("AT+CPIN?", ["+CPIN: READY", "OK"]);
    module.reply_to("AT+COPS?", ["+COPS: 0,0,\"CHINA MOBILE\",7", "OK"]);
    module.reply_to("AT+CGSN", ["861234567890123", "OK"]);
    module.reply_to("ATH", ["OK"]);

    for number in numbers.iter().filter_map(|n| sanitize_number(n).ok()) {
        module.reply_to(&format!("ATD{number};"), ["OK"]);
    }

    transport
}
