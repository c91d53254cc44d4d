// Query cost negotiation and payment attachment

use tracing::{debug, warn};

use super::{CostRead, Query, QueryKind};
use crate::codec::{SignedEnvelope, TransactionBody, TransactionData};
use crate::error::{Error, Result};
use crate::execute::{self, ExecutionContext};
use crate::frame::FrozenPayload;
use crate::operation_id::OperationId;
use crate::signer::sign_body;
use crate::types::{AccountId, AccountTransfer, Balance};

/// Payment decided for one paid query
///
/// Every node receives its own payment body (naming that node), all
/// sharing one operation id so at most one of them can ever be charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAttachment {
    pub amount: Balance,
    pub operation_id: OperationId,
}

impl PaymentAttachment {
    /// Operator-signed transfer of `amount` from the operator to `node`
    pub(crate) fn envelope_for(
        &self,
        node: AccountId,
        ctx: &ExecutionContext,
        query: &'static str,
    ) -> Result<SignedEnvelope> {
        let operator = ctx.require_operator(query)?;
        let amount = self.amount as i128;

        let mut payload = FrozenPayload::freeze(&TransactionBody {
            operation_id: self.operation_id,
            node_account_id: node,
            transaction_fee: ctx.config.default_max_transaction_fee,
            valid_duration_secs: ctx.config.valid_duration_secs,
            memo: String::new(),
            data: TransactionData::Transfer {
                transfers: vec![
                    AccountTransfer::new(operator.account_id, -amount),
                    AccountTransfer::new(node, amount),
                ],
            },
        })?;
        let signature = sign_body(operator.key.as_ref(), payload.body_bytes())?;
        payload.add_signatures([signature]);
        Ok(payload.to_envelope())
    }
}

/// Decide what a paid query pays.
///
/// An explicit amount is used as given. Otherwise the cost is read with a
/// payment-free request and checked against the ceiling before any paid
/// attempt; a quote equal to the ceiling is accepted.
pub(crate) async fn negotiate<K: QueryKind>(
    query: &Query<K>,
    ctx: &ExecutionContext,
) -> Result<PaymentAttachment> {
    let payer = ctx.require_operator(K::NAME)?.account_id;

    let amount = match query.payment_amount {
        Some(amount) => amount,
        None => {
            let max = query
                .max_query_payment
                .unwrap_or(ctx.config.default_max_query_payment);
            let cost = execute::execute(&CostRead { query }, ctx).await?;
            debug!("{} quoted at {} (max {})", K::NAME, cost, max);

            if cost > max {
                warn!("{} cost {} is above the maximum payment {}", K::NAME, cost, max);
                return Err(Error::MaxQueryPaymentExceeded {
                    query: K::NAME,
                    cost,
                    max,
                });
            }
            cost
        }
    };

    Ok(PaymentAttachment {
        amount,
        operation_id: OperationId::generate(payer),
    })
}
