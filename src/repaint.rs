/// Called whenever a background lookup settles, successful or not.
pub trait Repaint
where
    Self: Send + Sync + 'static + Clone,
{
    fn repaint(&self) {}
}

impl Repaint for flume::Sender<()> {
    fn repaint(&self) {
        let _ = self.send(());
    }
}

impl Repaint for () {}
