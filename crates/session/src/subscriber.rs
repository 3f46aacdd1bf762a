/// The subscriber a session is bound to, parsed out of a Subscription-Id
/// grouped AVP on the first request of a session (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub msisdn: String,
    pub imsi: Option<String>,
    pub sip_uri: Option<String>,
    pub nai: Option<String>,
    pub private_id: Option<String>,
}

impl Subscriber {
    pub fn new(msisdn: impl Into<String>) -> Self {
        Self {
            msisdn: msisdn.into(),
            imsi: None,
            sip_uri: None,
            nai: None,
            private_id: None,
        }
    }

    /// Builds a subscriber from the (type, data) pairs decoded out of a
    /// message's Subscription-Id AVPs, using whichever identity is
    /// present (spec §4.5 follows the source's `parse_subscription_id`).
    pub fn from_subscription_ids(ids: &[(u32, String)]) -> Option<Self> {
        use codec::constants::subscription_id_type::*;

        let msisdn = ids
            .iter()
            .find(|(ty, _)| *ty == END_USER_E164)
            .map(|(_, data)| data.clone())?;

        let mut subscriber = Self::new(msisdn);
        for (ty, data) in ids {
            match *ty {
                END_USER_IMSI => subscriber.imsi = Some(data.clone()),
                END_USER_SIP_URI => subscriber.sip_uri = Some(data.clone()),
                END_USER_NAI => subscriber.nai = Some(data.clone()),
                END_USER_PRIVATE => subscriber.private_id = Some(data.clone()),
                _ => {}
            }
        }
        Some(subscriber)
    }
}
