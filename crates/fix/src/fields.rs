//! FIX 4.4 field and value constants used by the gateway.
//!
//! Only the tags this application reads or writes are listed; this is an
//! order-entry gateway, not a general FIX dictionary.

/// Field delimiter.
pub const SOH: u8 = 0x01;

/// BeginString value for every message.
pub const BEGIN_STRING: &str = "FIX.4.4";

/// Tag numbers.
pub mod tags {
    pub const BEGIN_STRING: u32 = 8;
    pub const BODY_LENGTH: u32 = 9;
    pub const CHECKSUM: u32 = 10;
    pub const CL_ORD_ID: u32 = 11;
    pub const CUM_QTY: u32 = 14;
    pub const EXEC_ID: u32 = 17;
    pub const LAST_PX: u32 = 31;
    pub const LAST_QTY: u32 = 32;
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const MSG_TYPE: u32 = 35;
    pub const ORDER_ID: u32 = 37;
    pub const ORDER_QTY: u32 = 38;
    pub const ORD_STATUS: u32 = 39;
    pub const ORD_TYPE: u32 = 40;
    pub const ORIG_CL_ORD_ID: u32 = 41;
    pub const PRICE: u32 = 44;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const SENDING_TIME: u32 = 52;
    pub const SIDE: u32 = 54;
    pub const SYMBOL: u32 = 55;
    pub const TARGET_COMP_ID: u32 = 56;
    pub const TEXT: u32 = 58;
    pub const TRANSACT_TIME: u32 = 60;
    pub const AVG_PX: u32 = 6;
    pub const ENCRYPT_METHOD: u32 = 98;
    pub const CXL_REJ_REASON: u32 = 102;
    pub const ORD_REJ_REASON: u32 = 103;
    pub const HEART_BT_INT: u32 = 108;
    pub const TEST_REQ_ID: u32 = 112;
    pub const EXEC_TYPE: u32 = 150;
    pub const LEAVES_QTY: u32 = 151;
    pub const CXL_REJ_RESPONSE_TO: u32 = 434;
}

/// MsgType (35) values.
pub mod msg_type {
    pub const HEARTBEAT: &str = "0";
    pub const TEST_REQUEST: &str = "1";
    pub const LOGOUT: &str = "5";
    pub const EXECUTION_REPORT: &str = "8";
    pub const ORDER_CANCEL_REJECT: &str = "9";
    pub const LOGON: &str = "A";
    pub const NEW_ORDER_SINGLE: &str = "D";
    pub const ORDER_CANCEL_REQUEST: &str = "F";
}

/// ExecType (150) values.
pub mod exec_type {
    pub const NEW: char = '0';
    pub const CANCELED: char = '4';
    pub const REJECTED: char = '8';
    pub const TRADE: char = 'F';
}

/// OrdStatus (39) values.
pub mod ord_status {
    pub const NEW: char = '0';
    pub const PARTIALLY_FILLED: char = '1';
    pub const FILLED: char = '2';
    pub const CANCELED: char = '4';
    pub const REJECTED: char = '8';
}

/// CxlRejReason (102) values.
pub mod cxl_rej_reason {
    pub const TOO_LATE_TO_CANCEL: u32 = 0;
    pub const UNKNOWN_ORDER: u32 = 1;
    pub const DUPLICATE_CL_ORD_ID: u32 = 6;
}

/// CxlRejResponseTo (434) values.
pub mod cxl_rej_response_to {
    pub const ORDER_CANCEL_REQUEST: char = '1';
}
