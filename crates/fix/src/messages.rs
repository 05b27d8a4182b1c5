//! Typed application messages.
//!
//! Inbound traffic is two concrete messages behind one tagged enum;
//! dispatch is a pattern match at the boundary, not a class hierarchy.
//! Outbound responses build their `(tag, value)` field lists explicitly.

use crate::codec::{CodecError, RawMessage};
use crate::fields::{cxl_rej_response_to, msg_type, tags};

/// NewOrderSingle (35=D), as received.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderSingle {
    pub cl_ord_id: String,
    pub symbol: String,
    /// Raw tag 54 value; validated by admission, not here.
    pub side: char,
    pub order_qty: i64,
    /// `None` when the message carried no Price (44) tag.
    pub price: Option<f64>,
    /// Raw tag 40 value, recorded as received.
    pub ord_type: Option<char>,
}

impl NewOrderSingle {
    pub fn from_raw(raw: &RawMessage) -> Result<Self, CodecError> {
        let price = match raw.get(tags::PRICE) {
            Some(_) => Some(raw.get_f64(tags::PRICE)?),
            None => None,
        };
        let ord_type = match raw.get(tags::ORD_TYPE) {
            Some(_) => Some(raw.get_char(tags::ORD_TYPE)?),
            None => None,
        };
        Ok(Self {
            cl_ord_id: raw.get_required(tags::CL_ORD_ID)?.to_string(),
            symbol: raw.get(tags::SYMBOL).unwrap_or_default().to_string(),
            side: raw.get_char(tags::SIDE)?,
            order_qty: raw.get_i64(tags::ORDER_QTY)?,
            price,
            ord_type,
        })
    }
}

/// OrderCancelRequest (35=F), as received.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCancelRequest {
    pub orig_cl_ord_id: String,
    pub cl_ord_id: String,
    pub symbol: String,
    pub side: char,
}

impl OrderCancelRequest {
    pub fn from_raw(raw: &RawMessage) -> Result<Self, CodecError> {
        Ok(Self {
            orig_cl_ord_id: raw.get_required(tags::ORIG_CL_ORD_ID)?.to_string(),
            cl_ord_id: raw.get_required(tags::CL_ORD_ID)?.to_string(),
            symbol: raw.get(tags::SYMBOL).unwrap_or_default().to_string(),
            side: raw.get_char(tags::SIDE)?,
        })
    }
}

/// The two inbound application messages the gateway consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMessage {
    NewOrderSingle(NewOrderSingle),
    OrderCancelRequest(OrderCancelRequest),
}

impl AppMessage {
    /// Decode an application message, or `None` for session-level types.
    pub fn decode(raw: &RawMessage) -> Result<Option<Self>, CodecError> {
        match raw.msg_type() {
            Some(msg_type::NEW_ORDER_SINGLE) => {
                Ok(Some(Self::NewOrderSingle(NewOrderSingle::from_raw(raw)?)))
            }
            Some(msg_type::ORDER_CANCEL_REQUEST) => Ok(Some(Self::OrderCancelRequest(
                OrderCancelRequest::from_raw(raw)?,
            ))),
            _ => Ok(None),
        }
    }
}

/// ExecutionReport (35=8), to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub order_id: String,
    pub exec_id: String,
    pub exec_type: char,
    pub ord_status: char,
    pub side: char,
    pub leaves_qty: i64,
    pub cum_qty: i64,
    pub avg_px: f64,
    pub cl_ord_id: String,
    pub orig_cl_ord_id: Option<String>,
    pub symbol: String,
    pub order_qty: Option<i64>,
    pub price: Option<f64>,
    pub last_qty: Option<i64>,
    pub last_px: Option<f64>,
    pub ord_rej_reason: Option<u32>,
    pub text: Option<String>,
}

impl ExecutionReport {
    /// Flatten into wire fields in a stable order.
    pub fn to_fields(&self) -> Vec<(u32, String)> {
        let mut fields = vec![
            (tags::ORDER_ID, self.order_id.clone()),
            (tags::EXEC_ID, self.exec_id.clone()),
            (tags::EXEC_TYPE, self.exec_type.to_string()),
            (tags::ORD_STATUS, self.ord_status.to_string()),
            (tags::SIDE, self.side.to_string()),
            (tags::LEAVES_QTY, self.leaves_qty.to_string()),
            (tags::CUM_QTY, self.cum_qty.to_string()),
            (tags::AVG_PX, format_px(self.avg_px)),
            (tags::CL_ORD_ID, self.cl_ord_id.clone()),
            (tags::SYMBOL, self.symbol.clone()),
        ];
        if let Some(orig) = &self.orig_cl_ord_id {
            fields.push((tags::ORIG_CL_ORD_ID, orig.clone()));
        }
        if let Some(qty) = self.order_qty {
            fields.push((tags::ORDER_QTY, qty.to_string()));
        }
        if let Some(px) = self.price {
            fields.push((tags::PRICE, format_px(px)));
        }
        if let Some(qty) = self.last_qty {
            fields.push((tags::LAST_QTY, qty.to_string()));
        }
        if let Some(px) = self.last_px {
            fields.push((tags::LAST_PX, format_px(px)));
        }
        if let Some(code) = self.ord_rej_reason {
            fields.push((tags::ORD_REJ_REASON, code.to_string()));
        }
        if let Some(text) = &self.text {
            fields.push((tags::TEXT, text.clone()));
        }
        fields.push((
            tags::TRANSACT_TIME,
            chrono::Utc::now().format("%Y%m%d-%H:%M:%S%.3f").to_string(),
        ));
        fields
    }
}

/// OrderCancelReject (35=9), to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCancelReject {
    pub order_id: String,
    pub cl_ord_id: String,
    pub orig_cl_ord_id: String,
    pub ord_status: char,
    pub cxl_rej_reason: u32,
}

impl OrderCancelReject {
    pub fn to_fields(&self) -> Vec<(u32, String)> {
        vec![
            (tags::ORDER_ID, self.order_id.clone()),
            (tags::CL_ORD_ID, self.cl_ord_id.clone()),
            (tags::ORIG_CL_ORD_ID, self.orig_cl_ord_id.clone()),
            (tags::ORD_STATUS, self.ord_status.to_string()),
            (
                tags::CXL_REJ_RESPONSE_TO,
                cxl_rej_response_to::ORDER_CANCEL_REQUEST.to_string(),
            ),
            (tags::CXL_REJ_REASON, self.cxl_rej_reason.to_string()),
        ]
    }
}

/// An outbound application message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    ExecutionReport(ExecutionReport),
    OrderCancelReject(OrderCancelReject),
}

impl Outbound {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Outbound::ExecutionReport(_) => msg_type::EXECUTION_REPORT,
            Outbound::OrderCancelReject(_) => msg_type::ORDER_CANCEL_REJECT,
        }
    }

    pub fn to_fields(&self) -> Vec<(u32, String)> {
        match self {
            Outbound::ExecutionReport(er) => er.to_fields(),
            Outbound::OrderCancelReject(rej) => rej.to_fields(),
        }
    }
}

// Trailing-zero-free decimal, matching how prices arrived.
fn format_px(px: f64) -> String {
    format!("{}", px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::fields::{exec_type, ord_status};

    fn raw_from(fields: &[(u32, &str)]) -> RawMessage {
        let owned: Vec<(u32, String)> = fields
            .iter()
            .map(|(t, v)| (*t, v.to_string()))
            .collect();
        let msg_type = owned
            .iter()
            .find(|(t, _)| *t == tags::MSG_TYPE)
            .map(|(_, v)| v.clone())
            .unwrap();
        let body: Vec<(u32, String)> = owned
            .into_iter()
            .filter(|(t, _)| *t != tags::MSG_TYPE)
            .collect();
        let bytes = encode(&msg_type, "CLIENT", "BLOTTER", 1, &body);
        RawMessage::parse(&bytes).unwrap()
    }

    #[test]
    fn test_decode_new_order_single() {
        let raw = raw_from(&[
            (tags::MSG_TYPE, "D"),
            (tags::CL_ORD_ID, "abc-1"),
            (tags::SYMBOL, "AAPL"),
            (tags::SIDE, "1"),
            (tags::ORDER_QTY, "500"),
            (tags::PRICE, "150.25"),
            (tags::ORD_TYPE, "2"),
        ]);

        let msg = AppMessage::decode(&raw).unwrap().unwrap();
        let AppMessage::NewOrderSingle(nos) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(nos.cl_ord_id, "abc-1");
        assert_eq!(nos.symbol, "AAPL");
        assert_eq!(nos.side, '1');
        assert_eq!(nos.order_qty, 500);
        assert_eq!(nos.price, Some(150.25));
        assert_eq!(nos.ord_type, Some('2'));
    }

    #[test]
    fn test_decode_new_order_without_price() {
        let raw = raw_from(&[
            (tags::MSG_TYPE, "D"),
            (tags::CL_ORD_ID, "abc-2"),
            (tags::SYMBOL, "MSFT"),
            (tags::SIDE, "2"),
            (tags::ORDER_QTY, "100"),
        ]);

        let AppMessage::NewOrderSingle(nos) = AppMessage::decode(&raw).unwrap().unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(nos.price, None);
        assert_eq!(nos.ord_type, None);
    }

    #[test]
    fn test_decode_missing_symbol_is_empty_not_error() {
        // An absent Symbol must reach admission (which rejects it with
        // "Symbol is required"), not die in the codec.
        let raw = raw_from(&[
            (tags::MSG_TYPE, "D"),
            (tags::CL_ORD_ID, "abc-3"),
            (tags::SIDE, "1"),
            (tags::ORDER_QTY, "10"),
        ]);
        let AppMessage::NewOrderSingle(nos) = AppMessage::decode(&raw).unwrap().unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(nos.symbol, "");
    }

    #[test]
    fn test_decode_cancel_request() {
        let raw = raw_from(&[
            (tags::MSG_TYPE, "F"),
            (tags::ORIG_CL_ORD_ID, "abc-1"),
            (tags::CL_ORD_ID, "abc-1-cxl"),
            (tags::SYMBOL, "AAPL"),
            (tags::SIDE, "1"),
        ]);

        let AppMessage::OrderCancelRequest(cxl) = AppMessage::decode(&raw).unwrap().unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(cxl.orig_cl_ord_id, "abc-1");
        assert_eq!(cxl.cl_ord_id, "abc-1-cxl");
    }

    #[test]
    fn test_decode_session_message_is_none() {
        let raw = raw_from(&[(tags::MSG_TYPE, "0")]);
        assert!(AppMessage::decode(&raw).unwrap().is_none());
    }

    #[test]
    fn test_exec_report_fields() {
        let er = ExecutionReport {
            order_id: "ORD1".into(),
            exec_id: "EXEC1".into(),
            exec_type: exec_type::NEW,
            ord_status: ord_status::NEW,
            side: '1',
            leaves_qty: 500,
            cum_qty: 0,
            avg_px: 0.0,
            cl_ord_id: "abc-1".into(),
            orig_cl_ord_id: None,
            symbol: "AAPL".into(),
            order_qty: Some(500),
            price: Some(150.25),
            last_qty: None,
            last_px: None,
            ord_rej_reason: None,
            text: None,
        };

        let fields = er.to_fields();
        let get = |tag: u32| {
            fields
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get(tags::ORDER_ID).unwrap(), "ORD1");
        assert_eq!(get(tags::EXEC_TYPE).unwrap(), "0");
        assert_eq!(get(tags::LEAVES_QTY).unwrap(), "500");
        assert_eq!(get(tags::CUM_QTY).unwrap(), "0");
        assert_eq!(get(tags::AVG_PX).unwrap(), "0");
        assert_eq!(get(tags::PRICE).unwrap(), "150.25");
        assert!(get(tags::ORD_REJ_REASON).is_none());
        assert!(get(tags::TRANSACT_TIME).is_some());
    }

    #[test]
    fn test_cancel_reject_fields() {
        let rej = OrderCancelReject {
            order_id: "UNKNOWN".into(),
            cl_ord_id: "c2".into(),
            orig_cl_ord_id: "c1".into(),
            ord_status: ord_status::REJECTED,
            cxl_rej_reason: 1,
        };

        let fields = rej.to_fields();
        let get = |tag: u32| {
            fields
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get(tags::ORDER_ID).unwrap(), "UNKNOWN");
        assert_eq!(get(tags::CXL_REJ_REASON).unwrap(), "1");
        assert_eq!(get(tags::CXL_REJ_RESPONSE_TO).unwrap(), "1");
    }

    #[test]
    fn test_outbound_msg_types() {
        let er = ExecutionReport {
            order_id: "o".into(),
            exec_id: "e".into(),
            exec_type: exec_type::NEW,
            ord_status: ord_status::NEW,
            side: '1',
            leaves_qty: 0,
            cum_qty: 0,
            avg_px: 0.0,
            cl_ord_id: "c".into(),
            orig_cl_ord_id: None,
            symbol: "S".into(),
            order_qty: None,
            price: None,
            last_qty: None,
            last_px: None,
            ord_rej_reason: None,
            text: None,
        };
        assert_eq!(Outbound::ExecutionReport(er).msg_type(), "8");

        let rej = OrderCancelReject {
            order_id: "o".into(),
            cl_ord_id: "c".into(),
            orig_cl_ord_id: "g".into(),
            ord_status: ord_status::CANCELED,
            cxl_rej_reason: 6,
        };
        assert_eq!(Outbound::OrderCancelReject(rej).msg_type(), "9");
    }
}
