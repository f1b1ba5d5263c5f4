//! Call data for relayed and nested executions

use crate::request::AuthorizationRequest;
use ethers_core::abi::{encode, Token};
use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::id;

/// Entry called by the relay on the originating account
pub const EXECUTE_USER_OP_SIGNATURE: &str = "executeUserOp(address,uint256,bytes,uint8)";

/// Entry a nested account calls on its parent
pub const EXEC_TRANSACTION_SIGNATURE: &str =
    "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)";

/// `executeUserOp(to, value, data, operation)` for `request`
pub fn execute_user_op(request: &AuthorizationRequest) -> Bytes {
    let mut call_data = id(EXECUTE_USER_OP_SIGNATURE).to_vec();
    call_data.extend(encode(&[
        Token::Address(request.to),
        Token::Uint(request.value),
        Token::Bytes(request.data.to_vec()),
        Token::Uint(U256::from(request.operation.as_u8())),
    ]));
    call_data.into()
}

/// `execTransaction` on the parent with `signatures`; refund and gas
/// payment parameters are zero because the relay pays for execution
pub fn exec_transaction(request: &AuthorizationRequest, signatures: &[u8]) -> Bytes {
    let mut call_data = id(EXEC_TRANSACTION_SIGNATURE).to_vec();
    call_data.extend(encode(&[
        Token::Address(request.to),
        Token::Uint(request.value),
        Token::Bytes(request.data.to_vec()),
        Token::Uint(U256::from(request.operation.as_u8())),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
        Token::Address(Address::zero()),
        Token::Address(Address::zero()),
        Token::Bytes(signatures.to_vec()),
    ]));
    call_data.into()
}
