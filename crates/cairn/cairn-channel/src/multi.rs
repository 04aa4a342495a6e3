use crossbeam_channel::Receiver;
use std::thread;

/// Fans several source channels into one.
///
/// Every value from every source appears exactly once on the returned
/// channel, in whatever order the forwarders win the hand-off. The output is
/// a rendezvous channel and closes only after all sources have closed (an
/// empty `sources` yields an already-closed channel).
///
/// One forwarding thread runs per source; it stops early if the output
/// receiver is dropped.
pub fn merge<T, I>(sources: I) -> Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Receiver<T>>,
{
    let (tx, rx) = crossbeam_channel::bounded(0);

    for source in sources {
        let tx = tx.clone();
        thread::spawn(move || {
            for value in source.iter() {
                if tx.send(value).is_err() {
                    break;
                }
            }
        });
    }

    rx
}
