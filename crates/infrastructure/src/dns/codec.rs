use dnsmux_domain::DomainError;
use hickory_proto::op::Message;

pub fn decode_message(bytes: &[u8]) -> Result<Message, DomainError> {
    Message::from_vec(bytes).map_err(|e| DomainError::DecodeError(e.to_string()))
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, DomainError> {
    message
        .to_vec()
        .map_err(|e| DomainError::EncodeError(e.to_string()))
}
