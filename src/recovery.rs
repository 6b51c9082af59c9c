use crate::error::Error;
use crate::platform::Platform;
use crate::raw::StatusWord;
use crate::{Eeprom, PageId, PageStatus};
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// What `init` does for a pair of page states.
///
/// ```text
/// +----------+------------------+------------------+------------------+---------+
/// | page 0   |            page 1                                                |
/// |          +------------------+------------------+------------------+---------+
/// |          | ERASED           | TRANSFER         | VALID            | INVALID |
/// +----------+------------------+------------------+------------------+---------+
/// | ERASED   | format           | promote page 1   | none             | format  |
/// | TRANSFER | promote page 0   | format           | restart page 0   | format  |
/// | VALID    | none             | restart page 1   | format           | format  |
/// | INVALID  | format           | format           | format           | format  |
/// +----------+------------------+------------------+------------------+---------+
/// ```
///
/// Two valid pages are formatted as well, even though one of them may only be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    /// One page is valid and the other one erased.
    None,
    /// A transfer was interrupted after the source page was erased. The given transfer page holds
    /// every record and becomes valid.
    Promote(PageId),
    /// A transfer was interrupted while copying. The partial copy on the given transfer page is
    /// erased and the transfer starts over from the valid page.
    RestartTransfer(PageId),
    /// The status combination is not reachable by any interrupted operation. Both pages are
    /// erased and page 0 is marked valid, all data is lost.
    Format,
}

impl RecoveryAction {
    pub const fn for_statuses(page0: PageStatus, page1: PageStatus) -> Self {
        use PageStatus::{Erased, Transfer, Valid};

        match (page0, page1) {
            (Erased, Valid) | (Valid, Erased) => RecoveryAction::None,
            (Transfer, Erased) => RecoveryAction::Promote(PageId::Page0),
            (Erased, Transfer) => RecoveryAction::Promote(PageId::Page1),
            (Transfer, Valid) => RecoveryAction::RestartTransfer(PageId::Page0),
            (Valid, Transfer) => RecoveryAction::RestartTransfer(PageId::Page1),
            _ => RecoveryAction::Format,
        }
    }
}

impl<T: Platform> Eeprom<T> {
    pub(crate) fn recover(&mut self) -> Result<RecoveryAction, Error> {
        #[cfg(feature = "debug-logs")]
        println!("recovery: recover");

        let statuses = self.page_statuses()?;

        // the header is the first word to be erased, the remaining sectors may still hold data
        for page in PageId::ALL {
            if statuses[page as usize] == PageStatus::Erased {
                self.erase_page(page)?;
            }
        }

        let action = RecoveryAction::for_statuses(statuses[0], statuses[1]);

        #[cfg(feature = "defmt")]
        trace!("recover: {} {} -> {}", statuses[0], statuses[1], action);

        #[cfg(feature = "debug-logs")]
        println!("recovery: {statuses:?} -> {action:?}");

        match action {
            RecoveryAction::None => {}
            RecoveryAction::Promote(page) => self.mark_page(page, StatusWord::Valid)?,
            RecoveryAction::RestartTransfer(page) => {
                self.erase_page(page)?;
                self.transfer_page()?;
            }
            RecoveryAction::Format => {
                #[cfg(feature = "defmt")]
                warn!("recover: invalid page states {} {}", statuses[0], statuses[1]);

                self.format_pages()?;
            }
        }

        self.ensure_capacity()?;

        Ok(action)
    }
}
